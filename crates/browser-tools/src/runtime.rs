use std::sync::Arc;

use agent_mode::{
    AgentConfig, AgentController, AgentResult, CancelHandle, LanguageModelClient, ProgressCallback,
    ProgressUpdate, RunSnapshot,
};

use crate::config::ToolConfig;
use crate::executor::BrowserToolExecutor;
use crate::host::{BrowserHost, InMemoryLocalData, LocalDataHost};

/// A controller wired to the browser tools, ready to run tasks.
pub struct AgentRuntime {
    controller: Arc<AgentController>,
}

impl AgentRuntime {
    pub fn builder(
        model: Arc<dyn LanguageModelClient>,
        browser: Arc<dyn BrowserHost>,
    ) -> AgentRuntimeBuilder {
        AgentRuntimeBuilder::new(model, browser)
    }

    pub async fn run(&self, task: &str) -> AgentResult<Option<String>> {
        self.controller.run(task).await
    }

    pub fn cancel(&self) {
        self.controller.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.controller.cancel_handle()
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.controller.snapshot()
    }

    /// Shared handle for hosts that drive runs from a spawned task.
    pub fn controller(&self) -> Arc<AgentController> {
        self.controller.clone()
    }
}

pub struct AgentRuntimeBuilder {
    model: Arc<dyn LanguageModelClient>,
    browser: Arc<dyn BrowserHost>,
    local: Option<Arc<dyn LocalDataHost>>,
    agent_config: AgentConfig,
    tool_config: ToolConfig,
    progress: Option<ProgressCallback>,
}

impl AgentRuntimeBuilder {
    fn new(model: Arc<dyn LanguageModelClient>, browser: Arc<dyn BrowserHost>) -> Self {
        Self {
            model,
            browser,
            local: None,
            agent_config: AgentConfig::default(),
            tool_config: ToolConfig::default(),
            progress: None,
        }
    }

    pub fn with_local_data(mut self, local: Arc<dyn LocalDataHost>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_agent_config(mut self, config: AgentConfig) -> Self {
        self.agent_config = config;
        self
    }

    pub fn with_tool_config(mut self, config: ToolConfig) -> Self {
        self.tool_config = config;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> AgentRuntime {
        let local: Arc<dyn LocalDataHost> = match self.local {
            Some(local) => local,
            None => Arc::new(InMemoryLocalData::new()),
        };
        let executor = BrowserToolExecutor::new(self.browser, local, self.tool_config);
        let mut controller = AgentController::new(self.model, Box::new(executor), self.agent_config);
        if let Some(progress) = self.progress {
            controller = controller.with_progress(progress);
        }
        AgentRuntime {
            controller: Arc::new(controller),
        }
    }
}
