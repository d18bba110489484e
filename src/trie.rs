//! Reverse-labelled domain trie with `+` wildcard matching.
//!
//! Labels are split on `.` and inserted right-to-left, so a suffix match
//! ("example.com") becomes a prefix lookup in the trie ("com" -> "example").
//! A child under the literal key `+` matches any remaining non-empty prefix.

use std::collections::HashMap;

const WILDCARD: &str = "+";

#[derive(Debug, Default)]
pub struct Trie<V> {
    next: HashMap<String, Trie<V>>,
    value: Option<V>,
}

impl<V: Clone> Trie<V> {
    pub fn new() -> Self {
        Self {
            next: HashMap::new(),
            value: None,
        }
    }

    pub fn empty(&self) -> bool {
        self.next.is_empty()
    }

    /// Inserts `domain` (e.g. `"a.example.com"` or `"+.example.com"`) with `value`.
    pub fn insert(&mut self, domain: &str, value: V) {
        let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
        let mut node = self;
        for label in labels.into_iter().rev() {
            node = node.next.entry(label.to_string()).or_insert_with(Trie::new);
        }
        node.value = Some(value);
    }

    /// Searches for the deepest value-bearing node matching `domain`, preferring
    /// an exact label match over the wildcard child at each level.
    pub fn search(&self, domain: &str) -> Option<V> {
        let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
        let mut node = self;
        let mut best: Option<V> = None;
        for label in labels.into_iter().rev() {
            if let Some(child) = node.next.get(label) {
                node = child;
                if node.value.is_some() {
                    best = node.value.clone();
                }
                continue;
            }
            if let Some(child) = node.next.get(WILDCARD) {
                if let Some(v) = &child.value {
                    best = Some(v.clone());
                }
            }
            return best;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let mut t: Trie<&'static str> = Trie::new();
        t.insert("example.com", "EG1");
        assert_eq!(t.search("example.com"), Some("EG1"));
        assert_eq!(t.search("other.com"), None);
    }

    #[test]
    fn wildcard_match_any_non_empty_prefix() {
        let mut t: Trie<&'static str> = Trie::new();
        t.insert("+.example.com", "EG1");
        assert_eq!(t.search("a.example.com"), Some("EG1"));
        assert_eq!(t.search("a.b.example.com"), Some("EG1"));
        assert_eq!(t.search("example.com"), None);
    }

    #[test]
    fn exact_beats_wildcard() {
        let mut t: Trie<&'static str> = Trie::new();
        t.insert("+.example.com", "WILD");
        t.insert("a.example.com", "EXACT");
        assert_eq!(t.search("a.example.com"), Some("EXACT"));
        assert_eq!(t.search("b.example.com"), Some("WILD"));
    }

    #[test]
    fn trailing_dot_tolerated() {
        let mut t: Trie<&'static str> = Trie::new();
        t.insert("example.com", "EG1");
        assert_eq!(t.search("example.com."), Some("EG1"));
    }

    #[test]
    fn empty_trie_is_empty() {
        let t: Trie<&'static str> = Trie::new();
        assert!(t.empty());
    }
}
