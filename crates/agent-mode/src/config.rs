use serde::{Deserialize, Serialize};

use crate::{DEFAULT_MAX_CONTEXT_ITEMS, DEFAULT_MAX_ITERATIONS};

/// Loop limits and recovery knobs for a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub max_context_items: usize,
    /// Re-prompt the model (twice) before falling back to the default action.
    pub recovery_prompts: bool,
    pub parser: ParserPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_context_items: DEFAULT_MAX_CONTEXT_ITEMS,
            recovery_prompts: true,
            parser: ParserPolicy::default(),
        }
    }
}

impl AgentConfig {
    /// Reads a (possibly partial) JSON document; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Tuning for the "confused but productive" completion heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserPolicy {
    pub confused_completion: bool,
    pub confused_min_context: usize,
}

impl Default for ParserPolicy {
    fn default() -> Self {
        Self {
            confused_completion: true,
            confused_min_context: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            AgentConfig::from_json_str(r#"{ "max_iterations": 4, "parser": { "confused_completion": false } }"#)
                .unwrap();
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.max_context_items, 20);
        assert!(config.recovery_prompts);
        assert!(!config.parser.confused_completion);
        assert_eq!(config.parser.confused_min_context, 2);
    }
}
