use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type Params = Map<String, Value>;

/// Closed set of actions the agent may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    SearchWeb,
    OpenUrl,
    ReadPage,
    SearchHistory,
    GetRecentHistory,
    SearchBookmarks,
    SearchMemory,
    OpenTab,
    GetOpenTabs,
    FocusTab,
    Think,
    Complete,
}

impl ActionName {
    pub const ALL: [ActionName; 12] = [
        Self::SearchWeb,
        Self::OpenUrl,
        Self::ReadPage,
        Self::SearchHistory,
        Self::GetRecentHistory,
        Self::SearchBookmarks,
        Self::SearchMemory,
        Self::OpenTab,
        Self::GetOpenTabs,
        Self::FocusTab,
        Self::Think,
        Self::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchWeb => "search_web",
            Self::OpenUrl => "open_url",
            Self::ReadPage => "read_page",
            Self::SearchHistory => "search_history",
            Self::GetRecentHistory => "get_recent_history",
            Self::SearchBookmarks => "search_bookmarks",
            Self::SearchMemory => "search_memory",
            Self::OpenTab => "open_tab",
            Self::GetOpenTabs => "get_open_tabs",
            Self::FocusTab => "focus_tab",
            Self::Think => "think",
            Self::Complete => "complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(value))
    }

    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::SearchWeb | Self::SearchHistory | Self::SearchBookmarks | Self::SearchMemory => {
                &["query"]
            }
            Self::OpenUrl => &["url"],
            Self::Think => &["thought"],
            Self::Complete => &["summary"],
            Self::ReadPage
            | Self::GetRecentHistory
            | Self::OpenTab
            | Self::GetOpenTabs
            | Self::FocusTab => &[],
        }
    }

    pub fn optional_params(&self) -> &'static [&'static str] {
        match self {
            Self::SearchWeb => &["num_results"],
            Self::OpenUrl => &["wait_time"],
            Self::ReadPage => &["selector", "extract_type"],
            Self::SearchHistory => &["days_back", "max_results"],
            Self::GetRecentHistory => &["hours_back", "max_results"],
            Self::SearchBookmarks => &["max_results"],
            Self::SearchMemory | Self::Think => &[],
            Self::OpenTab => &["url", "urls", "active"],
            Self::GetOpenTabs => &["query"],
            Self::FocusTab => &["tabId", "url"],
            Self::Complete => &["confidence"],
        }
    }

    /// Actions whose main parameter is a free-text query.
    pub fn takes_query(&self) -> bool {
        matches!(
            self,
            Self::SearchWeb | Self::SearchHistory | Self::SearchBookmarks | Self::SearchMemory
        )
    }
}

impl FromStr for ActionName {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or(())
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{action} is missing required param: {param}")]
    MissingParam {
        action: ActionName,
        param: &'static str,
    },
}

/// A structured instruction produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action")]
    pub name: ActionName,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub reasoning: String,
}

impl Action {
    pub fn new(name: ActionName, params: Params, reasoning: impl Into<String>) -> Self {
        Self {
            name,
            params,
            reasoning: reasoning.into(),
        }
    }

    /// Lenient conversion from a decoded model reply.
    ///
    /// Requires an `action` string naming a known action. A missing or
    /// non-object `params` becomes empty, and a missing `reasoning` becomes "".
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let name = object
            .get("action")
            .and_then(Value::as_str)
            .and_then(ActionName::parse)?;
        let params = object
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some(Self::new(name, params, reasoning))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for param in self.name.required_params() {
            if !self.params.get(*param).is_some_and(is_present) {
                return Err(ValidationError::MissingParam {
                    action: self.name,
                    param,
                });
            }
        }
        Ok(())
    }

    /// Fills a blank `query` on query-bearing actions with `query`.
    pub fn with_default_query(mut self, query: &str) -> Self {
        let query = query.trim();
        if self.name.takes_query() && self.str_param("query").is_none() && !query.is_empty() {
            self.params
                .insert("query".to_string(), Value::String(query.to_string()));
        }
        self
    }

    /// Trimmed, non-empty string parameter.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Unsigned integer parameter; numeric strings are accepted as well.
    pub fn u64_param(&self, key: &str) -> Option<u64> {
        match self.params.get(key)? {
            Value::Number(number) => number
                .as_u64()
                .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64)),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn bool_param(&self, key: &str) -> Option<bool> {
        match self.params.get(key)? {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// String list parameter. A single string is treated as a one-item list.
    pub fn list_param(&self, key: &str) -> Vec<String> {
        match self.params.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(item)) if !item.trim().is_empty() => vec![item.trim().to_string()],
            _ => Vec::new(),
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(value: Value) -> Action {
        Action::from_value(&value).expect("known action")
    }

    #[test]
    fn every_name_round_trips_through_parse() {
        for name in ActionName::ALL {
            assert_eq!(ActionName::parse(name.as_str()), Some(name));
            assert_eq!(name.to_string(), name.as_str());
        }
        assert_eq!(ActionName::parse(" Search_Web "), Some(ActionName::SearchWeb));
        assert_eq!(ActionName::parse("click"), None);
    }

    #[test]
    fn required_and_optional_params_do_not_overlap() {
        for name in ActionName::ALL {
            for required in name.required_params() {
                assert!(!name.optional_params().contains(required), "{name}");
            }
        }
    }

    #[test]
    fn from_value_defaults_params_and_reasoning() {
        let parsed = action(json!({ "action": "get_open_tabs" }));
        assert_eq!(parsed.name, ActionName::GetOpenTabs);
        assert!(parsed.params.is_empty());
        assert_eq!(parsed.reasoning, "");

        let odd_params = action(json!({ "action": "think", "params": "oops" }));
        assert!(odd_params.params.is_empty());

        assert!(Action::from_value(&json!({ "action": "teleport" })).is_none());
        assert!(Action::from_value(&json!(["search_web"])).is_none());
    }

    #[test]
    fn validate_rejects_missing_or_blank_required_params() {
        let ok = action(json!({ "action": "search_web", "params": { "query": "rust" } }));
        assert!(ok.validate().is_ok());

        let blank = action(json!({ "action": "search_web", "params": { "query": "  " } }));
        assert_eq!(
            blank.validate(),
            Err(ValidationError::MissingParam {
                action: ActionName::SearchWeb,
                param: "query"
            })
        );

        let null = action(json!({ "action": "complete", "params": { "summary": null } }));
        assert!(null.validate().is_err());

        let optional_only = action(json!({ "action": "open_tab" }));
        assert!(optional_only.validate().is_ok());
    }

    #[test]
    fn default_query_only_fills_blank_queries() {
        let bare = action(json!({ "action": "search_web", "params": { "query": " " } }))
            .with_default_query("rust 2024 edition");
        assert_eq!(bare.str_param("query"), Some("rust 2024 edition"));
        assert!(bare.validate().is_ok());

        let given = action(json!({ "action": "search_history", "params": { "query": "docs" } }))
            .with_default_query("rust 2024 edition");
        assert_eq!(given.str_param("query"), Some("docs"));

        let open = action(json!({ "action": "open_url" })).with_default_query("rust");
        assert!(open.params.is_empty());

        let empty_task = action(json!({ "action": "search_web" })).with_default_query("  ");
        assert!(empty_task.validate().is_err());
    }

    #[test]
    fn lenient_param_accessors() {
        let parsed = action(json!({
            "action": "open_tab",
            "params": {
                "urls": ["https://a.test", " ", "https://b.test"],
                "active": "false",
                "max_results": "7",
                "hours_back": 12.0
            }
        }));
        assert_eq!(parsed.list_param("urls"), vec!["https://a.test", "https://b.test"]);
        assert_eq!(parsed.bool_param("active"), Some(false));
        assert_eq!(parsed.u64_param("max_results"), Some(7));
        assert_eq!(parsed.u64_param("hours_back"), Some(12));
        assert_eq!(parsed.str_param("missing"), None);
    }
}
