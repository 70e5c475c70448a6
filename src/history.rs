//! Command history for the `history` built-in

use std::collections::VecDeque;

pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// The most recent lines, oldest first, bounded by `limit`
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_SIZE)
    }
}

impl History {
    pub fn with_limit(limit: usize) -> Self {
        History {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.limit == 0 {
            return;
        }
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// `   1  line` listing, 1-indexed
    pub fn render(&self) -> String {
        self.iter()
            .enumerate()
            .map(|(i, line)| format!("{:4}  {}\n", i + 1, line))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_one_indexed() {
        let mut history = History::default();
        history.push("ls");
        history.push("echo hi");
        assert_eq!(history.render(), "   1  ls\n   2  echo hi\n");
    }

    #[test]
    fn oldest_entries_fall_off() {
        let mut history = History::with_limit(3);
        for line in ["a", "b", "c", "d", "e"] {
            history.push(line);
        }
        let lines: Vec<&str> = history.iter().collect();
        assert_eq!(lines, ["c", "d", "e"]);
    }

    #[test]
    fn default_keeps_a_thousand() {
        let mut history = History::default();
        for i in 0..1500 {
            history.push(i.to_string());
        }
        assert_eq!(history.len(), 1000);
        assert_eq!(history.iter().next(), Some("500"));
    }

    #[test]
    fn zero_limit_records_nothing() {
        let mut history = History::with_limit(0);
        history.push("ls");
        assert!(history.is_empty());
    }
}
