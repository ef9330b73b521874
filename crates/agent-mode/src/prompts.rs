//! Prompt templates for each phase of a run.

use crate::executor::ToolResult;

pub const SYSTEM: &str = r#"You are an autonomous browsing agent working for the user inside their browser. You can reach the web, their browsing history, their bookmarks and their saved notes.

## TOOLS

Web (at most 4 searches per task):
- search_web: search the web for current or external information
  params: { query: string, num_results?: number }
- open_url: load a page in the background and read it (the user does not see it)
  params: { url: string, wait_time?: number }
- read_page: read the tab the user is looking at
  params: { selector?: string, extract_type?: string }

Local data (use these FIRST for anything personal):
- search_history: search the user's browsing history
  params: { query: string, days_back?: number, max_results?: number }
- get_recent_history: what the user browsed recently
  params: { hours_back?: number, max_results?: number }
- search_bookmarks: search the user's bookmarks
  params: { query: string, max_results?: number }
- search_memory: search saved notes, todos and memories
  params: { query: string }

Browser actions:
- open_tab: open pages for the user to see
  params: { url?: string, urls?: string[], active?: boolean }
- get_open_tabs: list open tabs
  params: { query?: string }
- focus_tab: bring an open tab to the front
  params: { tabId?: number, url?: string }

Control:
- think: note your analysis before the next step
  params: { thought: string }
- complete: finish and hand over the answer
  params: { summary: string, confidence?: string }

## CHOOSING A TOOL

- Questions about the user's own activity ("what did I read yesterday", "that article I saw") start with get_recent_history or search_history.
- Saved pages go to search_bookmarks; notes and todos go to search_memory.
- Requests to show or open pages use open_tab; open_url is only for reading in the background.
- Current or external facts use search_web, sparingly.
- Finish as soon as you have enough. Do not over-research.

Reply with ONLY a JSON object:
{
  "reasoning": "why this action",
  "action": "action_name",
  "params": { ... }
}"#;

pub const COMPLETION_SYSTEM: &str =
    "You are a helpful assistant. Present the information clearly in Markdown.";

pub const STRICT_JSON_SYSTEM: &str = "Respond with ONLY a JSON object. No other text.";

pub fn plan(task: &str) -> String {
    format!(
        r#"Task: {task}

Decide what kind of task this is before acting:
- About the user's own data (history, bookmarks, what they read)? Start with get_recent_history, search_history, search_bookmarks or search_memory.
- About opening something they saw before? Find it in history or bookmarks first, then open_tab.
- About external or current information? Use search_web (limited to 4 searches).

Reply with your first action. Examples:
- "what did I browse yesterday" -> {{"action": "get_recent_history", "params": {{"hours_back": 24}}}}
- "find that news article about X" -> {{"action": "search_history", "params": {{"query": "X news"}}}}
- "weather in NYC right now" -> {{"action": "search_web", "params": {{"query": "weather NYC"}}}}"#
    )
}

pub fn next_action(task: &str, digest: &str, item_count: usize, last: &ToolResult) -> String {
    format!(
        r#"Task: {task}

Gathered so far ({item_count} items):
{digest}

Last result:
{synopsis}

Decide now and reply with JSON only:
- Enough information? {{"action": "complete", "params": {{"summary": "brief findings"}}}}
- Need the web? {{"action": "search_web", "params": {{"query": "..."}}}}
- Need history? {{"action": "search_history", "params": {{"query": "..."}}}}
- Show pages to the user? {{"action": "open_tab", "params": {{"urls": ["..."]}}}}

Reply with {{"action": "...", "params": {{...}}}} and nothing else."#,
        synopsis = result_synopsis(last),
    )
}

pub fn recover(error: &str, task: &str, item_count: usize) -> String {
    let gathered = if item_count == 0 {
        "none yet".to_string()
    } else {
        format!("yes, {item_count} items")
    };
    format!(
        r#"ERROR: {error}

Reply with ONLY a valid JSON object. No explanation, no markdown.

Task: {task}
Data gathered: {gathered}

Pick ONE:
A. Complete (if you have data): {{"action": "complete", "params": {{"summary": "brief summary of findings"}}}}
B. Search the web: {{"action": "search_web", "params": {{"query": "your search query"}}}}
C. Search history: {{"action": "search_history", "params": {{"query": "search term"}}}}

JSON:"#
    )
}

pub fn minimal_choice(task: &str, item_count: usize) -> String {
    format!(
        r#"Task: {task}

You have gathered {item_count} pieces of information.

Choose ONE action:
- {{"action": "complete", "params": {{"summary": "..."}}}} if you have enough info
- {{"action": "search_web", "params": {{"query": "..."}}}} to search more

JSON only:"#
    )
}

pub fn complete(task: &str, digest: &str, note: Option<&str>) -> String {
    let note = note.map(|note| format!("\nNote: {note}\n")).unwrap_or_default();
    format!(
        r#"Task: {task}
{note}
Everything gathered:
{digest}

Write a CONCISE answer for the user:
- at most 300 words, ideally 150-200
- direct, with bullet points for lists
- no filler such as "Based on my research"
- no inline source citations (sources are shown separately)

Format: one or two opening sentences, then the key points."#
    )
}

/// Short digest of the last tool result for the next-action prompt.
pub fn result_synopsis(result: &ToolResult) -> String {
    let mut lines = Vec::new();
    if !result.is_success() {
        lines.push(format!("x {} failed", result.action));
    }
    if result
        .data
        .get("ai_overview")
        .is_some_and(|overview| !overview.is_null())
    {
        lines.push("+ AI overview found".to_string());
    }
    if let Some(results) = result.data.get("results").and_then(|r| r.as_array()) {
        if !results.is_empty() {
            lines.push(format!("+ {} results", results.len()));
        }
    }
    if let Some(count) = result.count() {
        lines.push(format!("+ {count} items found"));
    }
    if let Some(error) = result.error_message() {
        lines.push(format!("! Error: {error}"));
    }
    if let Some(note) = result.note() {
        lines.push(format!("Note: {note}"));
    }
    if let Some(remaining) = result.data.get("searches_remaining").and_then(|r| r.as_u64()) {
        lines.push(format!("Searches left: {remaining}"));
    }
    if lines.is_empty() {
        lines.push(format!("{} finished", result.action));
    }
    lines.join("\n")
}
