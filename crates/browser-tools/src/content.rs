pub const TRUNCATION_MARKER: &str = "\n\n... [truncated]";

/// Case-insensitive prefix match against the deny list.
pub fn is_blocked(url: &str, prefixes: &[String]) -> bool {
    let url = url.trim_start().to_ascii_lowercase();
    prefixes
        .iter()
        .any(|prefix| url.starts_with(&prefix.to_ascii_lowercase()))
}

/// Keeps at most `max_chars` characters, appending a marker when cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deny_list() -> Vec<String> {
        vec!["chrome://".into(), "about:".into(), "data:".into()]
    }

    #[test]
    fn blocks_internal_schemes_in_any_case() {
        assert!(is_blocked("chrome://settings", &deny_list()));
        assert!(is_blocked("ABOUT:blank", &deny_list()));
        assert!(!is_blocked("https://example.com/about:", &deny_list()));
    }

    #[test]
    fn truncates_on_char_boundary() {
        let text = "héllo wörld";
        let cut = truncate_content(text, 4);
        assert!(cut.starts_with("héll"));
        assert!(cut.ends_with("... [truncated]"));
        assert_eq!(truncate_content(text, 11), text);
        assert_eq!(truncate_content("", 0), "");
    }
}
