use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-run allowance of web searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBudget {
    limit: u32,
    consumed: u32,
}

impl SearchBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, consumed: 0 }
    }

    /// Takes one unit before the search is attempted; a failed search still
    /// counts against the run.
    pub fn consume(&mut self) -> Result<ConsumeOutcome, BudgetError> {
        if self.consumed >= self.limit {
            return Err(BudgetError::Exhausted { limit: self.limit });
        }
        self.consumed = self.consumed.saturating_add(1);
        Ok(ConsumeOutcome {
            remaining: self.remaining(),
        })
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn reset(&mut self) {
        self.consumed = 0;
    }
}

/// Result of successfully consuming a search allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeOutcome {
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("search quota exhausted ({limit} per task)")]
    Exhausted { limit: u32 },
}
