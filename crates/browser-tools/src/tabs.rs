use std::collections::VecDeque;

use crate::host::TabId;

/// Background tabs opened by the agent, oldest first.
#[derive(Debug, Clone)]
pub struct TabPool {
    open: VecDeque<TabId>,
    capacity: usize,
}

impl TabPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            open: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Removes and returns the oldest tab when the pool has no free slot.
    /// The caller closes it before opening a new one.
    pub fn evict_candidate(&mut self) -> Option<TabId> {
        if self.open.len() >= self.capacity {
            self.open.pop_front()
        } else {
            None
        }
    }

    pub fn admit(&mut self, tab: TabId) {
        if !self.open.contains(&tab) {
            self.open.push_back(tab);
        }
    }

    pub fn release(&mut self, tab: TabId) -> bool {
        match self.open.iter().position(|open| *open == tab) {
            Some(idx) => {
                self.open.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn drain(&mut self) -> Vec<TabId> {
        self.open.drain(..).collect()
    }

    pub fn contains(&self, tab: TabId) -> bool {
        self.open.contains(&tab)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
