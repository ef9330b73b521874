use std::sync::Arc;
use std::time::Duration;

use agent_mode::{
    current_timestamp_ms, Action, ActionName, ToolError, ToolExecutor, ToolResult, ValidationError,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::budget::{BudgetError, SearchBudget};
use crate::config::ToolConfig;
use crate::content::{is_blocked, truncate_content};
use crate::host::{BrowserHost, LocalDataHost, TabId, TabInfo};
use crate::local::{top_matches, KeywordQuery};
use crate::tabs::TabPool;

const HOUR_MS: u64 = 60 * 60 * 1000;
const DAY_MS: u64 = 24 * HOUR_MS;
const LIMITED_CONTENT_CHARS: usize = 100;

#[derive(Debug)]
struct RunResources {
    budget: SearchBudget,
    tabs: TabPool,
}

/// Tool executor backed by a [`BrowserHost`] and a [`LocalDataHost`].
///
/// Owns the search budget and the pool of background tabs for whichever
/// controller it is attached to.
pub struct BrowserToolExecutor {
    browser: Arc<dyn BrowserHost>,
    local: Arc<dyn LocalDataHost>,
    config: ToolConfig,
    resources: Mutex<RunResources>,
}

impl BrowserToolExecutor {
    pub fn new(
        browser: Arc<dyn BrowserHost>,
        local: Arc<dyn LocalDataHost>,
        config: ToolConfig,
    ) -> Self {
        let resources = RunResources {
            budget: SearchBudget::new(config.max_searches),
            tabs: TabPool::new(config.max_tabs),
        };
        Self {
            browser,
            local,
            config,
            resources: Mutex::new(resources),
        }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub async fn managed_tabs(&self) -> usize {
        self.resources.lock().await.tabs.len()
    }

    pub async fn searches_remaining(&self) -> u32 {
        self.resources.lock().await.budget.remaining()
    }

    async fn search_web(&self, action: &Action) -> ToolResult {
        let query = action.str_param("query").unwrap_or_default();
        let num_results = action.u64_param("num_results").unwrap_or(5) as usize;

        let consumed = self.resources.lock().await.budget.consume();
        let remaining = match consumed {
            Ok(outcome) => outcome.remaining,
            Err(BudgetError::Exhausted { limit }) => {
                warn!(limit, "search budget exhausted");
                return ToolResult::degraded(
                    action.name,
                    json!({
                        "query": query,
                        "results": [],
                        "count": 0,
                        "searches_remaining": 0,
                        "note": format!(
                            "Search limit reached ({limit}). Use the information you have or complete the task."
                        ),
                    }),
                );
            }
        };

        let search_url = format!(
            "{}{}",
            self.config.search_endpoint,
            urlencoding::encode(query)
        );
        let tab = match self.acquire_tab(&search_url).await {
            Ok(tab) => tab,
            Err(err) => {
                warn!(error = %err, "search tab could not be opened");
                return ToolResult::degraded(
                    action.name,
                    json!({
                        "query": query,
                        "ai_overview": null,
                        "results": [],
                        "count": 0,
                        "searches_remaining": remaining,
                        "error": err.to_string(),
                        "note": "Search failed, try alternative approach",
                    }),
                );
            }
        };

        self.wait_for_page(tab.id, self.config.settle_delay()).await;
        let overview = self
            .browser
            .extract_ai_overview(tab.id)
            .await
            .unwrap_or_else(|err| {
                debug!(error = %err, "no AI overview extracted");
                None
            });
        let hits = self
            .browser
            .extract_search_results(tab.id, num_results)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "failed to extract search results");
                Vec::new()
            });
        self.release_tab(tab.id).await;

        let note = if overview.is_some() {
            Some("AI overview found")
        } else if hits.is_empty() {
            Some("No results, try different query")
        } else {
            None
        };
        let hits: Vec<_> = hits.into_iter().take(num_results).collect();
        ToolResult::ok(
            action.name,
            json!({
                "query": query,
                "ai_overview": overview,
                "count": hits.len(),
                "results": hits,
                "searches_remaining": remaining,
                "note": note,
            }),
        )
    }

    async fn open_url(&self, action: &Action) -> ToolResult {
        let url = action.str_param("url").unwrap_or_default();
        if is_blocked(url, &self.config.blocked_prefixes) {
            debug!(url, "refusing restricted url");
            return ToolResult::degraded(
                action.name,
                json!({ "url": url, "content": "", "note": "URL is restricted, skipping" }),
            );
        }

        let tab = match self.acquire_tab(url).await {
            Ok(tab) => tab,
            Err(err) => {
                warn!(url, error = %err, "page failed to load");
                return ToolResult::degraded(
                    action.name,
                    json!({
                        "url": url,
                        "title": url,
                        "content": format!("[Failed to load: {err}]"),
                        "error": err.to_string(),
                        "note": "Page failed to load, try alternative URL",
                    }),
                );
            }
        };

        let settle = self.config.settle_override(action.u64_param("wait_time"));
        self.wait_for_page(tab.id, settle).await;
        let extracted = self.browser.extract_content(tab.id).await;
        self.release_tab(tab.id).await;

        let title = if tab.title.is_empty() { url } else { tab.title.as_str() };
        match extracted {
            Ok(content) => {
                let note = (content.chars().count() < LIMITED_CONTENT_CHARS)
                    .then_some("Limited content extracted");
                ToolResult::ok(
                    action.name,
                    json!({
                        "url": url,
                        "title": title,
                        "content": truncate_content(&content, self.config.max_content_length),
                        "note": note,
                    }),
                )
            }
            Err(err) => {
                warn!(url, error = %err, "content extraction failed");
                ToolResult::degraded(
                    action.name,
                    json!({
                        "url": url,
                        "title": url,
                        "content": format!("[Could not extract content from {url}]"),
                        "error": err.to_string(),
                        "note": "Limited content extracted",
                    }),
                )
            }
        }
    }

    async fn read_page(&self, action: &Action) -> ToolResult {
        let selector = action.str_param("selector");
        let extract_type = action.str_param("extract_type").unwrap_or("text");
        match self.read_active_tab(selector).await {
            Ok(Some((tab, content))) => {
                let mut data = json!({
                    "url": tab.url,
                    "title": tab.title,
                    "extract_type": extract_type,
                    "content": truncate_content(&content, self.config.max_content_length),
                });
                if let Some(selector) = selector {
                    data["selector"] = json!(selector);
                    if content.is_empty() {
                        data["note"] = json!("No element matched the selector");
                    }
                }
                ToolResult::ok(action.name, data)
            }
            Ok(None) => ToolResult::degraded(
                action.name,
                json!({ "content": "", "error": "No active tab to read" }),
            ),
            Err(err) => {
                warn!(error = %err, "reading the active tab failed");
                ToolResult::degraded(
                    action.name,
                    json!({ "content": "", "error": err.to_string() }),
                )
            }
        }
    }

    async fn read_active_tab(
        &self,
        selector: Option<&str>,
    ) -> anyhow::Result<Option<(TabInfo, String)>> {
        let Some(tab) = self.browser.active_tab().await? else {
            return Ok(None);
        };
        let content = match selector {
            Some(selector) => self
                .browser
                .select_text(tab.id, selector)
                .await?
                .unwrap_or_default(),
            None => self.browser.extract_content(tab.id).await?,
        };
        Ok(Some((tab, content)))
    }

    async fn search_history(&self, action: &Action) -> ToolResult {
        let query = action.str_param("query").unwrap_or_default();
        let days_back = action.u64_param("days_back").unwrap_or(7);
        let max_results = action.u64_param("max_results").unwrap_or(20) as usize;
        let since = current_timestamp_ms().saturating_sub(days_back.saturating_mul(DAY_MS));

        let entries = match self.local.history_since(since).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "history lookup failed");
                return ToolResult::degraded(
                    action.name,
                    json!({ "query": query, "results": [], "count": 0, "error": err.to_string() }),
                );
            }
        };

        let keywords = KeywordQuery::new(query);
        let results: Vec<Value> = top_matches(entries, &keywords, max_results, |entry| {
            vec![entry.display_title(), entry.url.as_str()]
        })
        .into_iter()
        .map(|entry| {
            json!({
                "url": entry.url,
                "title": entry.display_title(),
                "visit_count": entry.visit_count,
                "last_visit_ms": entry.last_visit_ms,
            })
        })
        .collect();

        ToolResult::ok(
            action.name,
            json!({
                "query": query,
                "count": results.len(),
                "note": results.is_empty().then_some("No matching history found"),
                "results": results,
                "days_searched": days_back,
            }),
        )
    }

    async fn get_recent_history(&self, action: &Action) -> ToolResult {
        let hours_back = action.u64_param("hours_back").unwrap_or(24);
        let max_results = action.u64_param("max_results").unwrap_or(50) as usize;
        let since = current_timestamp_ms().saturating_sub(hours_back.saturating_mul(HOUR_MS));

        let mut entries = match self.local.history_since(since).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "recent history lookup failed");
                return ToolResult::degraded(
                    action.name,
                    json!({
                        "hours_back": hours_back,
                        "total_items": 0,
                        "by_domain": {},
                        "items": [],
                        "error": err.to_string(),
                    }),
                );
            }
        };
        entries.sort_by(|a, b| b.last_visit_ms.cmp(&a.last_visit_ms));
        entries.truncate(max_results);

        let mut by_domain: IndexMap<String, Vec<Value>> = IndexMap::new();
        for entry in &entries {
            let Some(host) = url::Url::parse(&entry.url)
                .ok()
                .and_then(|parsed| parsed.host_str().map(str::to_string))
            else {
                continue;
            };
            by_domain.entry(host).or_default().push(json!({
                "url": entry.url,
                "title": entry.display_title(),
                "last_visit_ms": entry.last_visit_ms,
            }));
        }
        let items: Vec<Value> = entries
            .iter()
            .take(self.config.recent_items_limit)
            .map(|entry| {
                json!({
                    "title": entry.display_title(),
                    "url": entry.url,
                    "last_visit_ms": entry.last_visit_ms,
                })
            })
            .collect();

        ToolResult::ok(
            action.name,
            json!({
                "hours_back": hours_back,
                "total_items": entries.len(),
                "by_domain": by_domain,
                "items": items,
            }),
        )
    }

    async fn search_bookmarks(&self, action: &Action) -> ToolResult {
        let query = action.str_param("query").unwrap_or_default();
        let max_results = action.u64_param("max_results").unwrap_or(20) as usize;

        let bookmarks = match self.local.bookmarks().await {
            Ok(bookmarks) => bookmarks,
            Err(err) => {
                warn!(error = %err, "bookmark lookup failed");
                return ToolResult::degraded(
                    action.name,
                    json!({ "query": query, "results": [], "count": 0, "error": err.to_string() }),
                );
            }
        };

        let links: Vec<_> = bookmarks.into_iter().filter(|b| b.url.is_some()).collect();
        let keywords = KeywordQuery::new(query);
        let results: Vec<Value> = top_matches(links, &keywords, max_results, |bookmark| {
            vec![bookmark.title.as_str(), bookmark.url.as_deref().unwrap_or_default()]
        })
        .into_iter()
        .map(|bookmark| {
            let url = bookmark.url.unwrap_or_default();
            let title = if bookmark.title.is_empty() { url.clone() } else { bookmark.title };
            json!({ "url": url, "title": title, "date_added_ms": bookmark.date_added_ms })
        })
        .collect();

        ToolResult::ok(
            action.name,
            json!({
                "query": query,
                "count": results.len(),
                "note": results.is_empty().then_some("No matching bookmarks found"),
                "results": results,
            }),
        )
    }

    async fn search_memory(&self, action: &Action) -> ToolResult {
        let query = action.str_param("query").unwrap_or_default();
        let snapshot = match self.local.memory().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "memory lookup failed");
                return ToolResult::degraded(
                    action.name,
                    json!({
                        "query": query,
                        "results": { "todos": [], "notes": [], "memories": [] },
                        "count": 0,
                        "error": err.to_string(),
                    }),
                );
            }
        };

        let keywords = KeywordQuery::new(query);
        let todos = top_matches(snapshot.todos, &keywords, usize::MAX, |todo| {
            vec![todo.text.as_str(), todo.url.as_deref().unwrap_or_default()]
        });
        let notes = top_matches(snapshot.notes, &keywords, usize::MAX, |note| {
            vec![note.text.as_str(), note.url.as_deref().unwrap_or_default()]
        });
        let memories = top_matches(snapshot.memories, &keywords, usize::MAX, |memory| {
            vec![memory.key.as_str(), memory.text.as_str()]
        });
        let count = todos.len() + notes.len() + memories.len();

        ToolResult::ok(
            action.name,
            json!({
                "query": query,
                "results": { "todos": todos, "notes": notes, "memories": memories },
                "count": count,
                "note": (count == 0).then_some("No matching memories found"),
            }),
        )
    }

    async fn open_tab(&self, action: &Action) -> ToolResult {
        let mut urls = action.list_param("urls");
        if urls.is_empty() {
            urls = action.list_param("url");
        }
        if urls.is_empty() {
            return ToolResult::failed(action.name, "No URL provided");
        }
        let active = action.bool_param("active").unwrap_or(true);

        let mut opened = Vec::new();
        for url in &urls {
            if is_blocked(url, &self.config.blocked_prefixes) {
                debug!(url = url.as_str(), "skipping restricted url");
                continue;
            }
            let focus = active && opened.is_empty();
            match self.browser.open_tab(url, focus).await {
                Ok(tab) => opened.push(json!({ "tabId": tab.id, "url": url, "active": focus })),
                Err(err) => {
                    warn!(url = url.as_str(), error = %err, "failed to open tab");
                    return ToolResult::degraded(
                        action.name,
                        json!({ "count": opened.len(), "opened": opened, "error": err.to_string() }),
                    );
                }
            }
        }

        ToolResult::ok(
            action.name,
            json!({
                "count": opened.len(),
                "note": format!("Opened {} tab(s) for the user", opened.len()),
                "opened": opened,
            }),
        )
    }

    async fn get_open_tabs(&self, action: &Action) -> ToolResult {
        let query = action.str_param("query");
        let tabs = match self.browser.list_tabs().await {
            Ok(tabs) => tabs,
            Err(err) => {
                warn!(error = %err, "listing tabs failed");
                return ToolResult::degraded(
                    action.name,
                    json!({ "tabs": [], "count": 0, "error": err.to_string() }),
                );
            }
        };

        let tabs: Vec<TabInfo> = match query {
            Some(query) => {
                let needle = query.to_lowercase();
                tabs.into_iter()
                    .filter(|tab| {
                        tab.title.to_lowercase().contains(&needle)
                            || tab.url.to_lowercase().contains(&needle)
                    })
                    .collect()
            }
            None => tabs,
        };
        ToolResult::ok(
            action.name,
            json!({ "count": tabs.len(), "tabs": tabs, "query": query }),
        )
    }

    async fn focus_tab(&self, action: &Action) -> ToolResult {
        match self.find_and_focus(action).await {
            Ok(Some(tab)) => ToolResult::ok(
                action.name,
                json!({ "found": true, "tabId": tab.id, "url": tab.url, "title": tab.title }),
            ),
            Ok(None) => ToolResult::degraded(
                action.name,
                json!({ "found": false, "note": "Tab not found" }),
            ),
            Err(err) => {
                warn!(error = %err, "focusing tab failed");
                ToolResult::degraded(
                    action.name,
                    json!({ "found": false, "error": err.to_string() }),
                )
            }
        }
    }

    async fn find_and_focus(&self, action: &Action) -> anyhow::Result<Option<TabInfo>> {
        let target = if let Some(id) = action.u64_param("tabId") {
            self.browser.get_tab(TabId(id)).await?
        } else if let Some(fragment) = action.str_param("url") {
            self.browser
                .list_tabs()
                .await?
                .into_iter()
                .find(|tab| tab.url.contains(fragment))
        } else {
            None
        };
        let Some(tab) = target else {
            return Ok(None);
        };
        self.browser.focus_tab(&tab).await?;
        Ok(Some(tab))
    }

    async fn complete(&self, action: &Action) -> ToolResult {
        self.close_all().await;
        ToolResult::ok(
            action.name,
            json!({
                "summary": action.str_param("summary"),
                "confidence": action.str_param("confidence").unwrap_or("high"),
                "completed": true,
            }),
        )
    }

    /// Opens a background tab, closing the oldest managed tab first when
    /// the pool is full.
    async fn acquire_tab(&self, url: &str) -> anyhow::Result<TabInfo> {
        let evicted = self.resources.lock().await.tabs.evict_candidate();
        if let Some(oldest) = evicted {
            warn!(tab = %oldest, "tab pool full, closing oldest tab");
            self.close_quietly(oldest).await;
        }
        let tab = self.browser.create_background_tab(url).await?;
        self.resources.lock().await.tabs.admit(tab.id);
        Ok(tab)
    }

    async fn release_tab(&self, tab: TabId) {
        let managed = self.resources.lock().await.tabs.release(tab);
        if managed {
            self.close_quietly(tab).await;
        }
    }

    async fn close_all(&self) {
        let drained = self.resources.lock().await.tabs.drain();
        for tab in drained {
            self.close_quietly(tab).await;
        }
    }

    async fn close_quietly(&self, tab: TabId) {
        if let Err(err) = self.browser.close_tab(tab).await {
            warn!(tab = %tab, error = %err, "failed to close tab");
        }
    }

    /// Waits for load completion up to the page-load timeout, then settles.
    /// Timeouts and load errors are tolerated.
    async fn wait_for_page(&self, tab: TabId, settle: Duration) {
        match tokio::time::timeout(self.config.page_load_timeout(), self.browser.wait_for_load(tab)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(tab = %tab, error = %err, "page load reported an error"),
            Err(_) => warn!(
                tab = %tab,
                timeout_ms = self.config.page_load_timeout_ms,
                "page load timed out, extracting anyway"
            ),
        }
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
    }
}

fn missing_param_message(err: &ValidationError) -> String {
    match err {
        ValidationError::MissingParam { param: "query", .. } => "No search query provided".to_string(),
        ValidationError::MissingParam { param: "url", .. } => "No URL provided".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ToolExecutor for BrowserToolExecutor {
    async fn begin_run(&self) {
        self.close_all().await;
        self.resources.lock().await.budget.reset();
    }

    async fn execute(&self, action: &Action) -> Result<ToolResult, ToolError> {
        if let Err(err) = action.validate() {
            debug!(error = %err, "rejecting action with missing params");
            return Ok(ToolResult::failed(action.name, missing_param_message(&err)));
        }

        let result = match action.name {
            ActionName::SearchWeb => self.search_web(action).await,
            ActionName::OpenUrl => self.open_url(action).await,
            ActionName::ReadPage => self.read_page(action).await,
            ActionName::SearchHistory => self.search_history(action).await,
            ActionName::GetRecentHistory => self.get_recent_history(action).await,
            ActionName::SearchBookmarks => self.search_bookmarks(action).await,
            ActionName::SearchMemory => self.search_memory(action).await,
            ActionName::OpenTab => self.open_tab(action).await,
            ActionName::GetOpenTabs => self.get_open_tabs(action).await,
            ActionName::FocusTab => self.focus_tab(action).await,
            ActionName::Think => ToolResult::ok(
                action.name,
                json!({ "thought": action.str_param("thought") }),
            ),
            ActionName::Complete => self.complete(action).await,
        };
        Ok(result)
    }

    async fn finish_run(&self) {
        self.close_all().await;
    }
}
