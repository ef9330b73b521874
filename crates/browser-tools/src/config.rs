use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Resource limits and endpoints for the browser tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub max_tabs: usize,
    pub max_searches: u32,
    pub page_load_timeout_ms: u64,
    /// Extra wait after load so scripted content can render.
    pub settle_delay_ms: u64,
    /// Characters, not bytes.
    pub max_content_length: usize,
    pub blocked_prefixes: Vec<String>,
    /// The URL-encoded query is appended verbatim.
    pub search_endpoint: String,
    pub recent_items_limit: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            max_tabs: 5,
            max_searches: 4,
            page_load_timeout_ms: 10_000,
            settle_delay_ms: 2_000,
            max_content_length: 50_000,
            blocked_prefixes: ["chrome://", "chrome-extension://", "file://", "about:", "data:"]
                .into_iter()
                .map(String::from)
                .collect(),
            search_endpoint: "https://www.google.com/search?udm=50&q=".to_string(),
            recent_items_limit: 20,
        }
    }
}

impl ToolConfig {
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Caller-requested settle time, capped at the page-load timeout.
    pub fn settle_override(&self, wait_ms: Option<u64>) -> Duration {
        match wait_ms {
            Some(wait) => Duration::from_millis(wait.min(self.page_load_timeout_ms)),
            None => self.settle_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ToolConfig::from_json_str(r#"{ "max_searches": 2, "settle_delay_ms": 0 }"#).unwrap();
        assert_eq!(config.max_searches, 2);
        assert_eq!(config.max_tabs, 5);
        assert_eq!(config.settle_delay(), Duration::ZERO);
        assert_eq!(config.blocked_prefixes.len(), 5);
    }

    #[test]
    fn wait_override_is_clamped() {
        let config = ToolConfig::default();
        assert_eq!(config.settle_override(Some(60_000)), Duration::from_secs(10));
        assert_eq!(config.settle_override(Some(500)), Duration::from_millis(500));
        assert_eq!(config.settle_override(None), Duration::from_secs(2));
    }
}
