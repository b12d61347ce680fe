//! Net-name table: a bijection between labels and node indices.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TransimError};

/// Case-insensitive label ↔ node index table.
///
/// Every label maps to exactly one index and every index carries at most one
/// label. Adding a label evicts both the label previously at that index and
/// the index the label previously pointed to. The spelling of the most
/// recent registration is kept for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelResolver {
    /// Lowercased label -> index
    by_label: BTreeMap<String, usize>,
    /// Index -> label as registered
    by_index: BTreeMap<usize, String>,
}

fn key(label: &str) -> String {
    label.to_lowercase()
}

impl LabelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table from a positional list; entry `i` labels index `i`. Empty
    /// entries are skipped.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut table = Self::new();
        for (index, label) in labels.iter().enumerate() {
            let label = label.as_ref();
            if !label.is_empty() {
                table.insert(label, index);
            }
        }
        table
    }

    /// Bind `label` to `index`, replacing any previous binding of either.
    pub fn add_label(&mut self, label: &str, index: usize) -> Result<()> {
        if label.is_empty() {
            return Err(TransimError::InvalidTopology {
                message: "label cannot be empty".to_string(),
            });
        }
        self.insert(label, index);
        Ok(())
    }

    fn insert(&mut self, label: &str, index: usize) {
        let k = key(label);
        if let Some(old_index) = self.by_label.remove(&k) {
            self.by_index.remove(&old_index);
        }
        if let Some(old_label) = self.by_index.remove(&index) {
            self.by_label.remove(&key(&old_label));
        }
        self.by_label.insert(k, index);
        self.by_index.insert(index, label.to_string());
    }

    /// Node index of `label`.
    pub fn index(&self, label: &str) -> Option<usize> {
        self.by_label.get(&key(label)).copied()
    }

    /// Label at `index`.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.by_index.get(&index).map(String::as_str)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.by_label.contains_key(&key(label))
    }

    pub fn has_label_at(&self, index: usize) -> bool {
        self.by_index.contains_key(&index)
    }

    pub fn remove_label(&mut self, label: &str) -> bool {
        match self.by_label.remove(&key(label)) {
            Some(index) => {
                self.by_index.remove(&index);
                true
            }
            None => false,
        }
    }

    pub fn remove_label_at(&mut self, index: usize) -> bool {
        match self.by_index.remove(&index) {
            Some(label) => {
                self.by_label.remove(&key(&label));
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_label.clear();
        self.by_index.clear();
    }

    /// All labels, ordered by index.
    pub fn labels(&self) -> Vec<&str> {
        self.by_index.values().map(String::as_str).collect()
    }

    /// All labelled indices, ascending.
    pub fn indices(&self) -> Vec<usize> {
        self.by_index.keys().copied().collect()
    }

    /// `(index, label)` pairs ordered by index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.by_index.iter().map(|(&i, l)| (i, l.as_str()))
    }

    /// Labels starting with `prefix`, case-insensitive.
    pub fn find_with_prefix(&self, prefix: &str) -> Vec<&str> {
        let prefix = key(prefix);
        self.iter()
            .filter(|(_, l)| key(l).starts_with(&prefix))
            .map(|(_, l)| l)
            .collect()
    }

    /// Labels matching a glob pattern (`*` any run, `?` one character),
    /// case-insensitive.
    pub fn find_matching(&self, pattern: &str) -> Vec<&str> {
        let pattern: Vec<char> = key(pattern).chars().collect();
        self.iter()
            .filter(|(_, l)| {
                let text: Vec<char> = key(l).chars().collect();
                glob_match(&pattern, &text)
            })
            .map(|(_, l)| l)
            .collect()
    }

    /// Required labels that are missing, in input order.
    pub fn validate_labels<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|l| !self.has_label(l))
            .map(str::to_string)
            .collect()
    }

    /// A new table holding both bindings; `other` wins on conflict.
    pub fn merge(&self, other: &LabelResolver) -> LabelResolver {
        let mut merged = self.clone();
        for (index, label) in other.iter() {
            merged.insert(label, index);
        }
        merged
    }

    /// Index of `label`, or `UnresolvedLabel` naming the referring `context`.
    pub fn index_or_err(&self, label: &str, context: &str) -> Result<usize> {
        self.index(label).ok_or_else(|| TransimError::UnresolvedLabel {
            label: label.to_string(),
            context: context.to_string(),
        })
    }
}

impl fmt::Display for LabelResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LabelResolver[count={}]", self.len())?;
        for (index, label) in self.iter() {
            writeln!(f, "  \"{}\" -> {}", label, index)?;
        }
        Ok(())
    }
}

fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some(('?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut t = LabelResolver::new();
        t.add_label("Vout", 3).unwrap();
        assert_eq!(t.index("VOUT"), Some(3));
        assert_eq!(t.label(3), Some("Vout"));
        assert!(t.has_label("vout"));
    }

    #[test]
    fn test_rebinding_keeps_bijection() {
        let mut t = LabelResolver::new();
        t.add_label("a", 1).unwrap();
        t.add_label("b", 2).unwrap();
        // "a" moves to 2, evicting "b" and freeing 1
        t.add_label("a", 2).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.index("a"), Some(2));
        assert!(!t.has_label("b"));
        assert!(!t.has_label_at(1));
        for (index, label) in t.iter() {
            assert_eq!(t.index(label), Some(index));
        }
    }

    #[test]
    fn test_new_label_on_taken_index_evicts_old_one() {
        let mut t = LabelResolver::new();
        t.add_label("X", 5).unwrap();
        t.add_label("Y", 5).unwrap();
        assert_eq!(t.index("X"), None);
        assert_eq!(t.index("Y"), Some(5));
        assert_eq!(t.label(5), Some("Y"));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_empty_label_rejected() {
        assert!(LabelResolver::new().add_label("", 1).is_err());
    }

    #[test]
    fn test_remove() {
        let mut t = LabelResolver::from_labels(&["", "in", "out"]);
        assert_eq!(t.len(), 2);
        assert!(t.remove_label("IN"));
        assert!(!t.remove_label("in"));
        assert!(t.remove_label_at(2));
        assert!(t.is_empty());
    }

    #[test]
    fn test_search() {
        let t = LabelResolver::from_labels(&["", "out1", "out2", "in", "outer"]);
        assert_eq!(t.find_with_prefix("OUT"), vec!["out1", "out2", "outer"]);
        assert_eq!(t.find_matching("out?"), vec!["out1", "out2"]);
        assert_eq!(t.find_matching("*r"), vec!["outer"]);
        assert_eq!(t.find_matching("*").len(), 4);
    }

    #[test]
    fn test_validate_labels() {
        let t = LabelResolver::from_labels(&["", "a", "b"]);
        assert_eq!(t.validate_labels(["a", "c", "B"]), vec!["c".to_string()]);
    }

    #[test]
    fn test_merge_prefers_other() {
        let left = LabelResolver::from_labels(&["", "x", "y"]);
        let mut right = LabelResolver::new();
        right.add_label("x", 5).unwrap();
        let merged = left.merge(&right);
        assert_eq!(merged.index("x"), Some(5));
        assert_eq!(merged.index("y"), Some(2));
        // Inputs untouched
        assert_eq!(left.index("x"), Some(1));
        assert_eq!(right.len(), 1);
    }

    #[test]
    fn test_index_or_err() {
        let t = LabelResolver::new();
        match t.index_or_err("missing", "probe") {
            Err(TransimError::UnresolvedLabel { label, context }) => {
                assert_eq!(label, "missing");
                assert_eq!(context, "probe");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
