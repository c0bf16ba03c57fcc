//! Group-scoped containers.
//!
//! TeX assignments made inside a group are undone when the group closes.
//! [`ScopedTable`] wraps a map with that semantics:
//! [`begin_scope`](ScopedTable::begin_scope) opens a group, every insert made
//! while the group is open records the binding it shadows, and
//! [`end_scope`](ScopedTable::end_scope) rolls all of them back in one pass.
//!
//! ```
//! # use texweave::engine::scope::ScopedTable;
//! let mut table = ScopedTable::new();
//! table.insert("parindent", 20);
//! table.begin_scope();
//! table.insert("parindent", 0);
//! assert_eq!(table.get(&"parindent"), Some(&0));
//! assert!(table.end_scope());
//! assert_eq!(table.get(&"parindent"), Some(&20));
//! ```

use std::collections::HashMap;
use std::hash::Hash;

use crate::token::{CatCode, CatCodeTable};

#[derive(Debug, Clone)]
pub struct ScopedTable<K: Eq + Hash + Clone, V> {
    values: HashMap<K, V>,
    // One frame per open scope. Each frame maps a key to the binding it
    // shadowed: `Some(v)` to restore, `None` to delete.
    shadows: Vec<HashMap<K, Option<V>>>,
}

impl<K: Eq + Hash + Clone, V> ScopedTable<K, V> {
    pub fn new() -> ScopedTable<K, V> {
        ScopedTable {
            values: HashMap::new(),
            shadows: Vec::new(),
        }
    }

    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    /// Bind `key` in the innermost open scope.
    pub fn insert(&mut self, key: K, value: V) {
        let old = self.values.insert(key.clone(), value);
        if let Some(frame) = self.shadows.last_mut() {
            // Only the binding in force when the scope opened is restored;
            // later rebindings within the same scope are absorbed.
            frame.entry(key).or_insert(old);
        }
    }

    /// Unbind `key` in the innermost open scope.
    pub fn remove(&mut self, key: &K) {
        let old = self.values.remove(key);
        if let Some(frame) = self.shadows.last_mut() {
            frame.entry(key.clone()).or_insert(old);
        }
    }

    pub fn begin_scope(&mut self) {
        self.shadows.push(HashMap::new());
    }

    /// Close the innermost scope, restoring every shadowed binding.
    /// Returns false if no scope is open.
    #[must_use]
    pub fn end_scope(&mut self) -> bool {
        match self.shadows.pop() {
            None => false,
            Some(frame) => {
                for (key, old) in frame {
                    match old {
                        Some(value) => {
                            self.values.insert(key, value);
                        }
                        None => {
                            self.values.remove(&key);
                        }
                    }
                }
                true
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.shadows.len()
    }
}

impl<K: Eq + Hash + Clone, V> Default for ScopedTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The catcode table with the same scope discipline as [`ScopedTable`].
///
/// Kept separate because the backing store is the flat
/// [`CatCodeTable`] rather than a hash map; the shadow frames record plain
/// (char, previous code) pairs since every character always has a code.
#[derive(Debug, Clone, Default)]
pub struct ScopedCatCodes {
    table: CatCodeTable,
    shadows: Vec<Vec<(char, CatCode)>>,
}

impl ScopedCatCodes {
    pub fn new() -> ScopedCatCodes {
        ScopedCatCodes {
            table: CatCodeTable::new(),
            shadows: Vec::new(),
        }
    }

    #[inline]
    pub fn get(&self, c: char) -> CatCode {
        self.table.get(c)
    }

    pub fn insert(&mut self, c: char, code: CatCode) {
        if let Some(frame) = self.shadows.last_mut() {
            if !frame.iter().any(|(fc, _)| *fc == c) {
                frame.push((c, self.table.get(c)));
            }
        }
        self.table.insert(c, code);
    }

    pub fn begin_scope(&mut self) {
        self.shadows.push(Vec::new());
    }

    #[must_use]
    pub fn end_scope(&mut self) -> bool {
        match self.shadows.pop() {
            None => false,
            Some(frame) => {
                for (c, code) in frame {
                    self.table.insert(c, code);
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_inside_scope_is_rolled_back() {
        let mut table = ScopedTable::new();
        table.begin_scope();
        table.insert(3, 5);
        assert_eq!(table.get(&3), Some(&5));
        assert!(table.end_scope());
        assert_eq!(table.get(&3), None);
    }

    #[test]
    fn rebinding_inside_scope_restores_outer_value() {
        let mut table = ScopedTable::new();
        table.insert("a", 1);
        table.begin_scope();
        table.insert("a", 2);
        table.insert("a", 3);
        assert_eq!(table.get(&"a"), Some(&3));
        assert!(table.end_scope());
        assert_eq!(table.get(&"a"), Some(&1));
    }

    #[test]
    fn nested_scopes_unwind_in_order() {
        let mut table = ScopedTable::new();
        table.insert("a", 1);
        table.begin_scope();
        table.insert("a", 2);
        table.begin_scope();
        table.insert("a", 3);
        assert!(table.end_scope());
        assert_eq!(table.get(&"a"), Some(&2));
        assert!(table.end_scope());
        assert_eq!(table.get(&"a"), Some(&1));
    }

    #[test]
    fn end_scope_without_begin_is_reported() {
        let mut table: ScopedTable<u8, u8> = ScopedTable::new();
        assert!(!table.end_scope());
    }

    #[test]
    fn global_inserts_survive_scopes() {
        let mut table = ScopedTable::new();
        table.insert("a", 1);
        table.begin_scope();
        assert!(table.end_scope());
        assert_eq!(table.get(&"a"), Some(&1));
    }

    #[test]
    fn catcode_changes_are_scoped() {
        let mut codes = ScopedCatCodes::new();
        codes.begin_scope();
        codes.insert('@', CatCode::Letter);
        assert_eq!(codes.get('@'), CatCode::Letter);
        assert!(codes.end_scope());
        assert_eq!(codes.get('@'), CatCode::Other);
    }
}
