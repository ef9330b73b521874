//! Agent mode for the side-panel assistant.
//! The crate owns the bounded plan/execute/observe loop: it asks a chat model
//! for the next action, recovers a valid action from whatever text comes back,
//! and hands it to a host-provided tool executor.

pub mod action;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod executor;
pub mod language_model;
pub mod parser;
pub mod progress;
pub mod prompts;

pub use action::{Action, ActionName, Params, ValidationError};
pub use config::{AgentConfig, ParserPolicy};
pub use context::{current_timestamp_ms, ContextItem, ContextLog};
pub use controller::{AgentController, CancelHandle, RunSnapshot};
pub use error::{AgentError, AgentResult};
pub use executor::{ResultKind, ToolError, ToolExecutor, ToolResult};
pub use language_model::{ChatMessage, ChatRole, LanguageModelClient};
pub use parser::{fallback_action, ResponseParser};
pub use progress::{describe_action, AgentStatus, ProgressCallback, ProgressUpdate};

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const DEFAULT_MAX_CONTEXT_ITEMS: usize = 20;
