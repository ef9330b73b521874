use thiserror::Error;

use crate::executor::ToolError;

pub type AgentResult<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent is already running")]
    AlreadyRunning,
    #[error("could not create initial plan")]
    PlanFailed,
    #[error("language model request failed: {0}")]
    Model(#[source] anyhow::Error),
    #[error(transparent)]
    Tool(#[from] ToolError),
}
