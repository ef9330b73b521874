//! Recovers an [`Action`] from free-form model output.
//!
//! Strategies run in order and the first hit wins:
//! fenced JSON, inline JSON (brace matched in one pass), keyword inference, and finally
//! the "confused but productive" completion heuristic. None of them can fail
//! loudly; a miss just hands the text to the next strategy.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::action::{Action, ActionName};
use crate::config::ParserPolicy;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid fence regex"));
static ACTION_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""action"\s*:\s*"[^"]+""#).expect("valid action key regex"));
static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("valid quote regex"));

/// Ordered: the first entry with any matching keyword wins.
const KEYWORD_TABLE: &[(ActionName, &[&str])] = &[
    (
        ActionName::SearchWeb,
        &["search the web", "google search", "searching for", "search online"],
    ),
    (
        ActionName::SearchHistory,
        &["search history", "browsing history", "look in history"],
    ),
    (
        ActionName::GetRecentHistory,
        &["recent history", "recently browsed", "what i surfed", "yesterday"],
    ),
    (ActionName::SearchBookmarks, &["search bookmarks", "bookmarked"]),
    (
        ActionName::SearchMemory,
        &["search memory", "notes", "todos", "remember"],
    ),
    (ActionName::OpenUrl, &["open url", "open the page", "visit"]),
    (
        ActionName::OpenTab,
        &["open tab", "show the user", "open for the user"],
    ),
    (
        ActionName::Complete,
        &[
            "complete",
            "done",
            "finished",
            "have enough",
            "task is complete",
            "summarize",
        ],
    ),
];

const CONFUSED_PHRASES: &[&str] = &["i have", "the information", "based on", "found"];

/// Open braces tried per action key by the inline strategy.
const MAX_INLINE_CANDIDATES: usize = 16;

const INFERRED_SUMMARY: &str = "Task completed based on gathered information";
const CONFUSED_SUMMARY: &str = "Completing task with gathered information";
const FALLBACK_SUMMARY: &str = "Completing with available information";

#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    policy: ParserPolicy,
}

impl ResponseParser {
    pub fn new(policy: ParserPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ParserPolicy {
        &self.policy
    }

    /// Runs every strategy in order. `context_len` is the number of items the
    /// run has already accumulated.
    pub fn parse(&self, text: &str, context_len: usize) -> Option<Action> {
        if text.trim().is_empty() {
            return None;
        }

        let strategies: [(&str, fn(&str) -> Option<Action>); 3] = [
            ("fenced_json", parse_fenced_json),
            ("inline_json", parse_inline_json),
            ("keywords", infer_from_keywords),
        ];
        for (strategy, parse) in strategies {
            if let Some(action) = parse(text) {
                debug!(strategy, action = %action.name, "parsed model action");
                return Some(action);
            }
        }

        let forced = self.confused_completion(text, context_len);
        if forced.is_some() {
            debug!("forcing completion: model looks done but gave no action");
        }
        forced
    }

    pub fn confused_completion(&self, text: &str, context_len: usize) -> Option<Action> {
        if !self.policy.confused_completion || context_len < self.policy.confused_min_context {
            return None;
        }
        let lower = text.to_lowercase();
        if !CONFUSED_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
            return None;
        }
        Some(Action::new(
            ActionName::Complete,
            summary_params(CONFUSED_SUMMARY),
            "Auto-completing as the model appears to have enough information",
        ))
    }
}

/// Deterministic last resort so the loop always moves forward.
pub fn fallback_action(task: &str, context_len: usize) -> Action {
    if context_len >= 1 {
        return Action::new(
            ActionName::Complete,
            summary_params(FALLBACK_SUMMARY),
            "Fallback: completing with gathered data",
        );
    }
    let mut params = Map::new();
    params.insert("query".into(), json!(task));
    Action::new(
        ActionName::SearchWeb,
        params,
        "Fallback: searching for the task",
    )
}

pub fn parse_fenced_json(text: &str) -> Option<Action> {
    let body = FENCED_BLOCK.captures(text)?.get(1)?.as_str().trim();
    let value: Value = serde_json::from_str(body).ok()?;
    Action::from_value(&value)
}

pub fn parse_inline_json(text: &str) -> Option<Action> {
    let keys: Vec<usize> = ACTION_KEY.find_iter(text).map(|key| key.start()).collect();
    if keys.is_empty() {
        return None;
    }
    for candidates in enclosing_objects(text, &keys) {
        for (start, end) in candidates {
            let Ok(value) = serde_json::from_str::<Value>(&text[start..end]) else {
                continue;
            };
            if let Some(action) = Action::from_value(&value) {
                return Some(action);
            }
        }
    }
    None
}

pub fn infer_from_keywords(text: &str) -> Option<Action> {
    let lower = text.to_lowercase();
    let (name, _) = KEYWORD_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(keyword)))?;

    let mut params = Map::new();
    if name.takes_query() {
        if let Some(query) = QUOTED.captures(text).and_then(|caps| caps.get(1)) {
            params.insert("query".into(), json!(query.as_str()));
        }
    }
    if *name == ActionName::Complete {
        params = summary_params(INFERRED_SUMMARY);
    }
    Some(Action::new(*name, params, "Inferred from response text"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    InString,
    Escaped,
}

/// For each offset in `keys` (ascending), the balanced `{...}` spans that
/// enclose it, outermost first. Only the 16 innermost open braces at each
/// key are considered.
///
/// One pass over `text`. Quotes open strings only inside an object, so braces
/// in JSON string values are skipped while stray quotes in prose are not.
pub fn enclosing_objects(text: &str, keys: &[usize]) -> Vec<Vec<(usize, usize)>> {
    let mut open: Vec<usize> = Vec::new();
    let mut ends: HashMap<usize, usize> = HashMap::new();
    let mut open_at_key: Vec<Vec<usize>> = Vec::with_capacity(keys.len());
    let mut state = ScanState::Code;

    for (idx, ch) in text.char_indices() {
        while open_at_key.len() < keys.len() && keys[open_at_key.len()] <= idx {
            open_at_key.push(innermost(&open));
        }
        state = match (state, ch) {
            (ScanState::Code, '"') if !open.is_empty() => ScanState::InString,
            (ScanState::Code, '{') => {
                open.push(idx);
                ScanState::Code
            }
            (ScanState::Code, '}') => {
                if let Some(start) = open.pop() {
                    ends.insert(start, idx + ch.len_utf8());
                }
                ScanState::Code
            }
            (ScanState::Code, _) => ScanState::Code,
            (ScanState::InString, '\\') => ScanState::Escaped,
            (ScanState::InString, '"') => ScanState::Code,
            (ScanState::InString, _) => ScanState::InString,
            (ScanState::Escaped, _) => ScanState::InString,
        };
    }
    while open_at_key.len() < keys.len() {
        open_at_key.push(innermost(&open));
    }

    open_at_key
        .into_iter()
        .map(|starts| {
            starts
                .into_iter()
                .filter_map(|start| ends.get(&start).map(|end| (start, *end)))
                .collect()
        })
        .collect()
}

fn innermost(open: &[usize]) -> Vec<usize> {
    open[open.len().saturating_sub(MAX_INLINE_CANDIDATES)..].to_vec()
}

fn summary_params(summary: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("summary".into(), json!(summary));
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ResponseParser {
        ResponseParser::default()
    }

    #[test]
    fn fenced_json_block() {
        let text = "```json\n{\"action\":\"search_web\",\"params\":{\"query\":\"x\"}}\n```";
        let action = parser().parse(text, 0).unwrap();
        assert_eq!(action.name, ActionName::SearchWeb);
        assert_eq!(action.params.get("query"), Some(&json!("x")));
        assert_eq!(action.reasoning, "");
    }

    #[test]
    fn fenced_json_is_idempotent() {
        let text = "Plan:\n```\n{\"reasoning\":\"r\",\"action\":\"think\",\"params\":{\"thought\":\"t\"}}\n```";
        let first = parser().parse(text, 3);
        let second = parser().parse(text, 3);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn inline_json_with_nested_params() {
        let text = r#"Sure! {"reasoning": "need {more} data", "action": "open_tab", "params": {"urls": ["https://a.test"], "opts": {"pinned": {"x": 1}}}} hope that helps"#;
        let action = parse_inline_json(text).unwrap();
        assert_eq!(action.name, ActionName::OpenTab);
        assert_eq!(action.reasoning, "need {more} data");
        assert_eq!(action.params["opts"]["pinned"]["x"], json!(1));
    }

    #[test]
    fn inline_json_skips_unrelated_leading_braces() {
        let text = r#"I considered {braces} first. {"action": "search_memory", "params": {"query": "todos"}}"#;
        let action = parse_inline_json(text).unwrap();
        assert_eq!(action.name, ActionName::SearchMemory);
    }

    #[test]
    fn brace_scanner_tracks_depth_and_strings() {
        let text = r#"xx{"a": {"b": "}"}, "c": "\"{"} tail"#;
        let key = text.find(r#""c""#).unwrap();
        let spans = enclosing_objects(text, &[key]);
        assert_eq!(spans.len(), 1);
        let [(start, end)] = spans[0][..] else {
            panic!("expected one enclosing object, got {:?}", spans[0]);
        };
        assert_eq!(&text[start..end], r#"{"a": {"b": "}"}, "c": "\"{"}"#);

        assert_eq!(enclosing_objects("{ unclosed", &[3]), vec![Vec::new()]);
        assert_eq!(enclosing_objects("no brace", &[2]), vec![Vec::new()]);
    }

    #[test]
    fn inline_json_tolerates_stray_quotes_in_prose() {
        let text = r#"He said "go {"action": "think", "params": {"thought": "hm"}}"#;
        let action = parse_inline_json(text).unwrap();
        assert_eq!(action.name, ActionName::Think);
    }

    #[test]
    fn inline_scan_stays_linear_on_brace_floods() {
        let flood = "{".repeat(100_000);
        let started = std::time::Instant::now();

        let unclosed = format!("{flood}\"action\": \"search_web\"");
        assert!(parser().parse(&unclosed, 0).is_none());

        let buried = format!(r#"{flood}{{"action": "think", "params": {{"thought": "x"}}}}"#);
        let action = parse_inline_json(&buried).unwrap();
        assert_eq!(action.name, ActionName::Think);

        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn keyword_inference_without_quotes() {
        let action = parser()
            .parse("I think we should search the web for cats", 0)
            .unwrap();
        assert_eq!(action.name, ActionName::SearchWeb);
        assert!(action.params.get("query").is_none());
        assert_eq!(action.reasoning, "Inferred from response text");
    }

    #[test]
    fn keyword_inference_extracts_first_quote() {
        let action = infer_from_keywords("Let me look at your browsing history for 'rust async' and \"tokio\"").unwrap();
        assert_eq!(action.name, ActionName::SearchHistory);
        assert_eq!(action.params.get("query"), Some(&json!("rust async")));
    }

    #[test]
    fn keyword_complete_gets_generic_summary() {
        let action = infer_from_keywords("All done here.").unwrap();
        assert_eq!(action.name, ActionName::Complete);
        assert_eq!(action.params.get("summary"), Some(&json!(INFERRED_SUMMARY)));
        assert!(action.validate().is_ok());
    }

    #[test]
    fn confused_heuristic_needs_context() {
        let text = "Based on what we saw, the answer is 42.";
        assert!(parser().parse(text, 1).is_none());
        let action = parser().parse(text, 2).unwrap();
        assert_eq!(action.name, ActionName::Complete);

        let disabled = ResponseParser::new(ParserPolicy {
            confused_completion: false,
            ..ParserPolicy::default()
        });
        assert!(disabled.parse(text, 5).is_none());
    }

    #[test]
    fn gibberish_falls_back() {
        assert!(parser().parse("qwzx vbnm", 1).is_none());
        let with_context = fallback_action("find cats", 1);
        assert_eq!(with_context.name, ActionName::Complete);
        assert_eq!(
            with_context.params.get("summary"),
            Some(&json!("Completing with available information"))
        );

        let empty = fallback_action("find cats", 0);
        assert_eq!(empty.name, ActionName::SearchWeb);
        assert_eq!(empty.params.get("query"), Some(&json!("find cats")));
    }

    #[test]
    fn unknown_action_in_json_moves_on() {
        let text = "```json\n{\"action\":\"teleport\"}\n```";
        assert!(parse_fenced_json(text).is_none());
        assert!(parse_inline_json(text).is_none());
    }

    #[test]
    fn parser_plus_fallback_is_total() {
        let inputs = [
            "x",
            "{",
            "}}}{{{",
            "```json\n{not json}\n```",
            "\"action\": \"nope\"",
            "🦀🦀🦀",
        ];
        for input in inputs {
            for context_len in [0, 1, 5] {
                let action = parser()
                    .parse(input, context_len)
                    .unwrap_or_else(|| fallback_action("task", context_len));
                assert!(ActionName::ALL.contains(&action.name));
            }
        }
    }
}
