use std::collections::HashSet;

/// Set of identity keys already collected. Keys are compared exactly,
/// so two labels differing only in whitespace are different rows.
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Returns true iff `key` was not seen before.
    pub fn add(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reports_first_insertion_only() {
        let mut index = DedupIndex::new();
        assert!(index.add("a"));
        assert!(!index.add("a"));
        assert!(index.has("a"));
        assert!(!index.has("b"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn keys_are_not_normalised() {
        let mut index = DedupIndex::new();
        assert!(index.add("通知"));
        assert!(index.add("通知 "));
        assert!(index.add(" 通知"));
        assert_eq!(index.len(), 3);
    }
}
