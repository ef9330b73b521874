#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};

use agent_mode::{CancelHandle, ChatMessage, LanguageModelClient, ProgressUpdate};
use anyhow::anyhow;
use async_trait::async_trait;
use browser_tools::{BrowserHost, SearchHit, TabId, TabInfo, ToolConfig};
use tokio::sync::Mutex as TokioMutex;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Tool limits with every delay removed.
pub fn fast_config() -> ToolConfig {
    ToolConfig {
        page_load_timeout_ms: 50,
        settle_delay_ms: 0,
        ..ToolConfig::default()
    }
}

pub struct ScriptedModel {
    responses: TokioMutex<VecDeque<Result<String, String>>>,
    prompts: TokioMutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: TokioMutex::new(responses.into()),
            prompts: TokioMutex::new(Vec::new()),
        })
    }

    pub async fn calls(&self) -> usize {
        self.prompts.lock().await.len()
    }

    pub async fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl LanguageModelClient for ScriptedModel {
    async fn send(&self, messages: &[ChatMessage], system_prompt: &str) -> anyhow::Result<String> {
        let content = messages
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts
            .lock()
            .await
            .push((system_prompt.to_string(), content));
        let next = self
            .responses
            .lock()
            .await
            .pop_front()
            .expect("scripted model ran out of responses");
        next.map_err(|message| anyhow!(message))
    }
}

#[derive(Debug, Default, Clone)]
pub struct BrowserLog {
    pub created_urls: Vec<String>,
    pub open_background: Vec<TabId>,
    pub closed: Vec<TabId>,
    pub max_open: usize,
    pub user_tabs: Vec<TabInfo>,
    pub focused: Vec<TabId>,
}

/// Recording browser. Background tabs get ids from 100 upwards.
pub struct MockBrowser {
    pub next_id: AtomicU64,
    pub log: Mutex<BrowserLog>,
    pub cancel_on_open: Mutex<Option<CancelHandle>>,
    pub page_content: String,
    pub page_title: String,
    pub search_hits: Vec<SearchHit>,
    pub ai_overview: Option<String>,
    pub hang_on_load: bool,
    pub fail_extraction: bool,
    pub active: Option<TabInfo>,
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(100),
            log: Mutex::new(BrowserLog::default()),
            cancel_on_open: Mutex::new(None),
            page_content: "Rust 1.85 stabilised the 2024 edition along with async closures. "
                .repeat(3),
            page_title: "Rust Blog".to_string(),
            search_hits: vec![
                hit("Announcing Rust 1.85", "https://blog.rust-lang.org/2025/02/20/Rust-1.85.0.html"),
                hit("Rust 2024 edition guide", "https://doc.rust-lang.org/edition-guide/rust-2024/"),
            ],
            ai_overview: Some("The 2024 edition shipped with Rust 1.85.".to_string()),
            hang_on_load: false,
            fail_extraction: false,
            active: None,
        }
    }
}

pub fn hit(title: &str, url: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        snippet: String::new(),
    }
}

pub fn user_tab(id: u64, url: &str, title: &str) -> TabInfo {
    TabInfo {
        id: TabId(id),
        url: url.to_string(),
        title: title.to_string(),
        active: false,
        window_id: 1,
    }
}

impl MockBrowser {
    pub fn with_user_tabs(self, tabs: Vec<TabInfo>) -> Self {
        self.log.lock().unwrap().user_tabs = tabs;
        self
    }

    pub fn cancel_on_open(&self, handle: CancelHandle) {
        *self.cancel_on_open.lock().unwrap() = Some(handle);
    }

    pub fn log(&self) -> BrowserLog {
        self.log.lock().unwrap().clone()
    }

    fn next_id(&self) -> TabId {
        TabId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl BrowserHost for MockBrowser {
    async fn create_background_tab(&self, url: &str) -> anyhow::Result<TabInfo> {
        if let Some(handle) = self.cancel_on_open.lock().unwrap().as_ref() {
            handle.cancel();
        }
        let id = self.next_id();
        let mut log = self.log.lock().unwrap();
        log.created_urls.push(url.to_string());
        log.open_background.push(id);
        log.max_open = log.max_open.max(log.open_background.len());
        Ok(TabInfo {
            id,
            url: url.to_string(),
            title: self.page_title.clone(),
            active: false,
            window_id: 1,
        })
    }

    async fn wait_for_load(&self, _tab: TabId) -> anyhow::Result<()> {
        if self.hang_on_load {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn extract_content(&self, _tab: TabId) -> anyhow::Result<String> {
        if self.fail_extraction {
            return Err(anyhow!("script injection blocked"));
        }
        Ok(self.page_content.clone())
    }

    async fn extract_search_results(&self, _tab: TabId, limit: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self.search_hits.iter().take(limit).cloned().collect())
    }

    async fn extract_ai_overview(&self, _tab: TabId) -> anyhow::Result<Option<String>> {
        Ok(self.ai_overview.clone())
    }

    async fn close_tab(&self, tab: TabId) -> anyhow::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.open_background.retain(|open| *open != tab);
        log.closed.push(tab);
        Ok(())
    }

    async fn active_tab(&self) -> anyhow::Result<Option<TabInfo>> {
        Ok(self.active.clone())
    }

    async fn select_text(&self, _tab: TabId, selector: &str) -> anyhow::Result<Option<String>> {
        Ok((selector == "#main").then(|| "Selected article body".to_string()))
    }

    async fn open_tab(&self, url: &str, active: bool) -> anyhow::Result<TabInfo> {
        let tab = TabInfo {
            id: self.next_id(),
            url: url.to_string(),
            title: String::new(),
            active,
            window_id: 1,
        };
        self.log.lock().unwrap().user_tabs.push(tab.clone());
        Ok(tab)
    }

    async fn list_tabs(&self) -> anyhow::Result<Vec<TabInfo>> {
        Ok(self.log.lock().unwrap().user_tabs.clone())
    }

    async fn get_tab(&self, tab: TabId) -> anyhow::Result<Option<TabInfo>> {
        Ok(self
            .log
            .lock()
            .unwrap()
            .user_tabs
            .iter()
            .find(|candidate| candidate.id == tab)
            .cloned())
    }

    async fn focus_tab(&self, tab: &TabInfo) -> anyhow::Result<()> {
        self.log.lock().unwrap().focused.push(tab.id);
        Ok(())
    }
}

pub type UpdateSink = Arc<Mutex<Vec<ProgressUpdate>>>;

pub fn update_sink() -> (UpdateSink, impl Fn(&ProgressUpdate) + Send + Sync + 'static) {
    let sink: UpdateSink = Arc::new(Mutex::new(Vec::new()));
    let writer = sink.clone();
    (sink, move |update: &ProgressUpdate| {
        writer.lock().unwrap().push(update.clone())
    })
}
