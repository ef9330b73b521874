use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Chat-completion client configured by the host (provider, model, key).
///
/// Returns the raw assistant text. Transport and auth failures surface as
/// errors and end the run.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    async fn send(&self, messages: &[ChatMessage], system_prompt: &str) -> Result<String>;
}
