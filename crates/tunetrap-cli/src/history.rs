use std::collections::VecDeque;
use tunetrap_core::Label;

pub const HISTORY_KEPT: usize = 20;
pub const HISTORY_SHOWN: usize = 10;

/// Recently published labels, oldest dropped first.
#[derive(Debug)]
pub struct History {
    labels: VecDeque<Label>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(HISTORY_KEPT)
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, label: Label) {
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
    }

    /// Up to `n` labels, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Label> {
        self.labels.iter().rev().take(n)
    }

    /// `happy, happy, neutral, ...` over the shown window.
    pub fn summary(&self) -> String {
        self.recent(HISTORY_SHOWN)
            .map(Label::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_twenty() {
        let mut history = History::default();
        for i in 0..25 {
            history.record(Label::Class(i));
        }
        assert_eq!(history.recent(usize::MAX).count(), HISTORY_KEPT);
        assert_eq!(history.recent(usize::MAX).last(), Some(&Label::Class(5)));
        assert_eq!(history.recent(1).next(), Some(&Label::Class(24)));
    }

    #[test]
    fn test_summary_newest_first() {
        let mut history = History::default();
        for i in 0..12 {
            history.record(Label::Class(i));
        }
        history.record(Label::Happy);
        assert_eq!(history.summary(), "happy, 11, 10, 9, 8, 7, 6, 5, 4, 3");
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(History::default().summary(), "");
    }
}
