use std::collections::VecDeque;

/// Number of recent actions kept for display.
pub const HISTORY_CAPACITY: usize = 5;

/// Most recent action labels, oldest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    labels: VecDeque<String>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self {
            labels: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// Append a label, evicting the oldest once over capacity.
    pub fn push(&mut self, label: impl Into<String>) {
        self.labels.push_back(label.into());
        while self.labels.len() > HISTORY_CAPACITY {
            self.labels.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }

    /// Display form, e.g. `LEFT | RIGHT | BOTH`.
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(" | ")
    }
}
