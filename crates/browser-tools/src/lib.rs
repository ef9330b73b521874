//! Browser-backed tools for agent mode: background-tab scraping, the user's
//! local data, and foreground tab actions, behind host traits.

pub mod budget;
pub mod config;
pub mod content;
pub mod executor;
pub mod host;
pub mod local;
pub mod runtime;
pub mod tabs;

pub use budget::{BudgetError, ConsumeOutcome, SearchBudget};
pub use config::ToolConfig;
pub use executor::BrowserToolExecutor;
pub use host::{
    BrowserHost, Bookmark, HistoryEntry, InMemoryLocalData, LocalDataHost, MemoryItem,
    MemorySnapshot, NoteItem, SearchHit, TabId, TabInfo, TodoItem,
};
pub use runtime::{AgentRuntime, AgentRuntimeBuilder};
pub use tabs::TabPool;
