use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::action::{Action, ActionName, Params};

/// How a tool invocation went.
///
/// `Degraded` still counts as success: the loop keeps going and the model
/// sees the `error`/`note` in the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Ok,
    Degraded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub kind: ResultKind,
    pub success: bool,
    pub action: ActionName,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(action: ActionName, data: Value) -> Self {
        Self::with_kind(ResultKind::Ok, action, data)
    }

    pub fn degraded(action: ActionName, data: Value) -> Self {
        Self::with_kind(ResultKind::Degraded, action, data)
    }

    pub fn failed(action: ActionName, error: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Failed,
            success: false,
            action,
            data: Map::new(),
            error: Some(error.into()),
        }
    }

    fn with_kind(kind: ResultKind, action: ActionName, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        Self {
            kind,
            success: kind != ResultKind::Failed,
            action,
            data,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind != ResultKind::Failed
    }

    /// Error reported either at the envelope level or inside `data`.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.data.get("error").and_then(Value::as_str))
    }

    pub fn note(&self) -> Option<&str> {
        self.data.get("note").and_then(Value::as_str)
    }

    pub fn count(&self) -> Option<u64> {
        self.data.get("count").and_then(Value::as_u64)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Executes validated actions for one controller.
///
/// `begin_run` resets per-run quotas and must also release anything a run
/// abandoned mid-flight left behind. `finish_run` releases held resources
/// when a run returns, on every exit path.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn begin_run(&self);

    async fn execute(&self, action: &Action) -> Result<ToolResult, ToolError>;

    async fn finish_run(&self);

    /// Dispatch by raw action name, for callers that bypass the parser.
    async fn execute_named(&self, name: &str, params: Params) -> Result<ToolResult, ToolError> {
        let name = ActionName::parse(name).ok_or_else(|| ToolError::UnknownAction(name.to_string()))?;
        self.execute(&Action::new(name, params, "")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn degraded_counts_as_success() {
        let result = ToolResult::degraded(
            ActionName::SearchWeb,
            json!({ "count": 0, "note": "Search limit reached (4)" }),
        );
        assert!(result.is_success());
        assert!(result.success);
        assert_eq!(result.count(), Some(0));
        assert_eq!(result.note(), Some("Search limit reached (4)"));

        let failed = ToolResult::failed(ActionName::SearchWeb, "No search query provided");
        assert!(!failed.success);
        assert_eq!(failed.error_message(), Some("No search query provided"));
    }

    #[test]
    fn serializes_success_flag_and_kind() {
        let value = serde_json::to_value(ToolResult::ok(ActionName::Think, json!({ "thought": "t" }))).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["kind"], json!("ok"));
        assert_eq!(value["action"], json!("think"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn non_object_data_is_wrapped() {
        let result = ToolResult::ok(ActionName::Think, json!("plain"));
        assert_eq!(result.data.get("value"), Some(&json!("plain")));
    }
}
