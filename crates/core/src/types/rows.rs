//! Ordered, editable sub-lists for form drafts.
//!
//! Lead parts, product fitments and alternate part numbers are all edited as
//! a list of rows the user can add to, remove from, or duplicate. Rows that
//! were added but never filled in are dropped before validation.

use serde::{Deserialize, Serialize};

/// A row type that can tell whether the user left it empty.
pub trait BlankRow {
    /// True when every user-editable field is empty.
    fn is_blank(&self) -> bool;
}

impl BlankRow for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

/// An ordered list of draft rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rows<T>(Vec<T>);

impl<T> Default for Rows<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Rows<T> {
    #[must_use]
    pub const fn new(rows: Vec<T>) -> Self {
        Self(rows)
    }

    pub fn push(&mut self, row: T) {
        self.0.push(row);
    }

    /// Remove the row at `index`. Out-of-range indexes are ignored.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        (index < self.0.len()).then(|| self.0.remove(index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T: Clone> Rows<T> {
    /// Insert a copy of the row at `index` directly after it.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn duplicate(&mut self, index: usize) -> bool {
        let Some(row) = self.0.get(index).cloned() else {
            return false;
        };
        self.0.insert(index + 1, row);
        true
    }
}

impl<T: BlankRow> Rows<T> {
    /// Drop rows the user never filled in, keeping the order of the rest.
    pub fn retain_filled(&mut self) {
        self.0.retain(|row| !row.is_blank());
    }

    /// Consuming form of [`Rows::retain_filled`].
    #[must_use]
    pub fn filled(mut self) -> Self {
        self.retain_filled();
        self
    }
}

impl<T> From<Vec<T>> for Rows<T> {
    fn from(rows: Vec<T>) -> Self {
        Self(rows)
    }
}

impl<T> IntoIterator for Rows<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Rows<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Part {
        description: String,
        vendor: String,
    }

    impl BlankRow for Part {
        fn is_blank(&self) -> bool {
            self.description.is_blank() && self.vendor.is_blank()
        }
    }

    fn part(description: &str) -> Part {
        Part {
            description: description.to_string(),
            vendor: String::new(),
        }
    }

    #[test]
    fn test_push_and_remove() {
        let mut rows = Rows::default();
        rows.push(part("Alternator"));
        rows.push(part("Starter"));
        assert_eq!(rows.len(), 2);

        assert_eq!(rows.remove(0), Some(part("Alternator")));
        assert_eq!(rows.remove(5), None);
        assert_eq!(rows.as_slice(), &[part("Starter")]);
    }

    #[test]
    fn test_duplicate_inserts_after_source() {
        let mut rows = Rows::new(vec![part("A"), part("B"), part("C")]);
        assert!(rows.duplicate(1));
        let names: Vec<_> = rows.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "B", "C"]);

        assert!(!rows.duplicate(10));
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_retain_filled_drops_blank_rows() {
        let mut rows = Rows::new(vec![part("Rotor"), part("  "), part(""), part("Caliper")]);
        rows.retain_filled();
        assert_eq!(rows.into_vec(), vec![part("Rotor"), part("Caliper")]);
    }

    #[test]
    fn test_string_rows() {
        let rows = Rows::new(vec!["PN-1".to_string(), " ".to_string()]).filled();
        assert_eq!(rows.len(), 1);
    }
}
