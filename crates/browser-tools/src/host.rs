use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Browser-assigned tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    #[serde(rename = "tabId")]
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub window_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub visit_count: u32,
    pub last_visit_ms: u64,
}

impl HistoryEntry {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(&self.url)
    }
}

/// Bookmark tree node. Folders have no URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date_added_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub created_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteItem {
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub key: String,
    pub text: String,
    #[serde(default)]
    pub created_at_ms: Option<u64>,
}

/// Everything the side panel keeps in local storage for the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default)]
    pub notes: Vec<NoteItem>,
    #[serde(default)]
    pub memories: Vec<MemoryItem>,
}

/// Tab-level browser operations the tools rely on.
///
/// Background tabs are created for scraping and must be closed by the
/// caller. `open_tab`/`focus_tab` act on the user's visible windows.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    async fn create_background_tab(&self, url: &str) -> Result<TabInfo>;

    /// Resolves once the tab reports load complete.
    async fn wait_for_load(&self, tab: TabId) -> Result<()>;

    async fn extract_content(&self, tab: TabId) -> Result<String>;

    async fn extract_search_results(&self, tab: TabId, limit: usize) -> Result<Vec<SearchHit>>;

    async fn extract_ai_overview(&self, tab: TabId) -> Result<Option<String>>;

    async fn close_tab(&self, tab: TabId) -> Result<()>;

    async fn active_tab(&self) -> Result<Option<TabInfo>>;

    /// Inner text of the first element matching `selector`, if any.
    async fn select_text(&self, tab: TabId, selector: &str) -> Result<Option<String>>;

    async fn open_tab(&self, url: &str, active: bool) -> Result<TabInfo>;

    async fn list_tabs(&self) -> Result<Vec<TabInfo>>;

    async fn get_tab(&self, tab: TabId) -> Result<Option<TabInfo>>;

    /// Activates the tab and focuses its window.
    async fn focus_tab(&self, tab: &TabInfo) -> Result<()>;
}

/// Read-only access to the user's history, bookmarks and saved items.
#[async_trait]
pub trait LocalDataHost: Send + Sync {
    async fn history_since(&self, since_ms: u64) -> Result<Vec<HistoryEntry>>;

    async fn bookmarks(&self) -> Result<Vec<Bookmark>>;

    async fn memory(&self) -> Result<MemorySnapshot>;
}

/// Local data held in memory; the default when the host supplies none.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocalData {
    history: Vec<HistoryEntry>,
    bookmarks: Vec<Bookmark>,
    memory: MemorySnapshot,
}

impl InMemoryLocalData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    pub fn with_bookmarks(mut self, bookmarks: Vec<Bookmark>) -> Self {
        self.bookmarks = bookmarks;
        self
    }

    pub fn with_memory(mut self, memory: MemorySnapshot) -> Self {
        self.memory = memory;
        self
    }
}

#[async_trait]
impl LocalDataHost for InMemoryLocalData {
    async fn history_since(&self, since_ms: u64) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .history
            .iter()
            .filter(|entry| entry.last_visit_ms >= since_ms)
            .cloned()
            .collect())
    }

    async fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        Ok(self.bookmarks.clone())
    }

    async fn memory(&self) -> Result<MemorySnapshot> {
        Ok(self.memory.clone())
    }
}
