//! Keyword scoring for the read-only local-data tools.

const PHRASE_WEIGHT: u32 = 10;

/// Lower-cased query split into a full phrase and its terms.
#[derive(Debug, Clone)]
pub struct KeywordQuery {
    phrase: String,
    terms: Vec<String>,
}

impl KeywordQuery {
    pub fn new(query: &str) -> Self {
        let phrase = query.trim().to_lowercase();
        let terms = phrase
            .split_whitespace()
            .filter(|term| term.chars().count() > 1)
            .map(str::to_string)
            .collect();
        Self { phrase, terms }
    }

    /// Whole phrase in any field scores 10; each term found anywhere adds 1.
    pub fn score(&self, fields: &[&str]) -> u32 {
        if self.phrase.is_empty() {
            return 0;
        }
        let fields: Vec<String> = fields.iter().map(|field| field.to_lowercase()).collect();
        let mut score = 0;
        if fields.iter().any(|field| field.contains(&self.phrase)) {
            score += PHRASE_WEIGHT;
        }
        for term in &self.terms {
            if fields.iter().any(|field| field.contains(term.as_str())) {
                score += 1;
            }
        }
        score
    }
}

/// Matching items ordered by score, ties kept in input order.
pub fn top_matches<T, F>(items: Vec<T>, query: &KeywordQuery, limit: usize, fields: F) -> Vec<T>
where
    F: Fn(&T) -> Vec<&str>,
{
    let mut scored: Vec<(u32, T)> = items
        .into_iter()
        .filter_map(|item| {
            let score = query.score(&fields(&item));
            (score > 0).then_some((score, item))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, item)| item).collect()
}
