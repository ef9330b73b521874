use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One executed step (or the initial plan) as remembered by the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub kind: String,
    pub data: Value,
    pub timestamp_ms: u64,
}

/// Sliding window over the most recent context items.
#[derive(Debug, Clone)]
pub struct ContextLog {
    items: VecDeque<ContextItem>,
    capacity: usize,
}

impl ContextLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn push(&mut self, kind: impl Into<String>, data: Value) {
        self.items.push_back(ContextItem {
            kind: kind.into(),
            data,
            timestamp_ms: current_timestamp_ms(),
        });
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items(&self) -> impl Iterator<Item = &ContextItem> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Numbered digest fed back into the next prompt:
    /// `[n] kind: data`, blank line between entries.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .enumerate()
            .map(|(idx, item)| format!("[{}] {}: {}", idx + 1, item.kind, render_data(&item.data)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn render_data(data: &Value) -> String {
    match data {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
        }
        other => other.to_string(),
    }
}

pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
