use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{Action, ActionName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Planning,
    Executing,
    Thinking,
    Completing,
    Complete,
    Error,
    Cancelled,
    MaxIterations,
    Recovering,
}

/// Snapshot handed to the UI on every phase transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub iterations: u32,
    pub max_iterations: u32,
    pub context_size: usize,
}

impl ProgressUpdate {
    pub fn new(status: AgentStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            step: None,
            message: message.into(),
            task: None,
            action: None,
            result: None,
            error: None,
            iterations: 0,
            max_iterations: 0,
            context_size: 0,
        }
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_task(mut self, task: &str) -> Self {
        self.task = Some(task.to_string());
        self
    }

    pub fn with_action(mut self, action: ActionName) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Human-readable line shown while an action runs.
pub fn describe_action(action: &Action) -> String {
    let query = action.str_param("query").unwrap_or_default();
    match action.name {
        ActionName::SearchWeb => format!("Searching web: \"{query}\""),
        ActionName::OpenUrl => format!(
            "Opening: {}",
            truncate_url(action.str_param("url").unwrap_or_default())
        ),
        ActionName::ReadPage => "Reading page content...".to_string(),
        ActionName::SearchHistory => format!("Searching your history: \"{query}\""),
        ActionName::GetRecentHistory => format!(
            "Getting your recent browsing (last {}h)...",
            action.u64_param("hours_back").unwrap_or(24)
        ),
        ActionName::SearchBookmarks => format!("Searching bookmarks: \"{query}\""),
        ActionName::SearchMemory => format!("Searching your notes & memories: \"{query}\""),
        ActionName::OpenTab => {
            let count = action.list_param("urls").len().max(1);
            format!("Opening {count} tab(s) for you...")
        }
        ActionName::GetOpenTabs => "Checking your open tabs...".to_string(),
        ActionName::FocusTab => "Bringing tab to focus...".to_string(),
        ActionName::Think => "Analyzing information...".to_string(),
        ActionName::Complete => "Completing task...".to_string(),
    }
}

fn truncate_url(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match url::Url::parse(raw) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let path = parsed.path();
            if path.chars().count() > 20 {
                let head: String = path.chars().take(20).collect();
                format!("{host}{head}...")
            } else {
                format!("{host}{path}")
            }
        }
        Err(_) => {
            let head: String = raw.chars().take(40).collect();
            format!("{head}...")
        }
    }
}
