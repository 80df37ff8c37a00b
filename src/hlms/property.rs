//! Property Sets
//!
//! A [`PropertySet`] maps interned identifiers to `i32` values. It is the input
//! of the template preprocessor and the fingerprint under which compute
//! pipelines are cached.
//!
//! # Ordering
//!
//! Entries are kept sorted by [`IdString`] so two sets built in different
//! insertion orders compare and hash equal. Equality is therefore content
//! equality, which is what the pipeline cache relies on.
//!
//! ```rust,ignore
//! use hlms::hlms::PropertySet;
//!
//! let mut a = PropertySet::new();
//! a.set("num_thread_groups_x", 4);
//! a.set("use_shared_memory", 1);
//!
//! let mut b = PropertySet::new();
//! b.set("use_shared_memory", 1);
//! b.set("num_thread_groups_x", 4);
//!
//! assert_eq!(a, b);
//! ```

use std::hash::{BuildHasher, Hash, Hasher};

use crate::utils::IdString;

/// Ordered mapping from identifiers to integer values.
///
/// # Performance
///
/// - Insertion/lookup: O(log n) binary search
/// - Comparison: O(n) over symbol pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    entries: Vec<(IdString, i32)>,
}

impl PropertySet {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Sets a property, replacing any previous value.
    pub fn set(&mut self, key: impl Into<IdString>, value: i32) {
        let key = key.into();
        match self.entries.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(idx) => self.entries[idx].1 = value,
            Err(idx) => self.entries.insert(idx, (key, value)),
        }
    }

    /// Returns the value of `key`, or 0 when it was never set.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> i32 {
        self.get_or(key, 0)
    }

    /// Returns the value of `key`, or `default` when it was never set.
    #[must_use]
    pub fn get_or(&self, key: &str, default: i32) -> i32 {
        IdString::lookup(key)
            .and_then(|id| self.try_get_id(id))
            .unwrap_or(default)
    }

    #[inline]
    #[must_use]
    pub fn get_id(&self, key: IdString) -> i32 {
        self.try_get_id(key).unwrap_or(0)
    }

    #[inline]
    #[must_use]
    pub fn try_get_id(&self, key: IdString) -> Option<i32> {
        self.entries
            .binary_search_by_key(&key, |&(k, _)| k)
            .ok()
            .map(|idx| self.entries[idx].1)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        IdString::lookup(key).is_some_and(|id| self.try_get_id(id).is_some())
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(id) = IdString::lookup(key) else {
            return false;
        };
        if let Ok(idx) = self.entries.binary_search_by_key(&id, |&(k, _)| k) {
            self.entries.remove(idx);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (IdString, i32)> + '_ {
        self.entries.iter().copied()
    }

    /// Merges `other` into `self`. Values from `other` win on conflicts.
    pub fn merge(&mut self, other: &PropertySet) {
        for &(key, value) in &other.entries {
            self.set(key, value);
        }
    }

    /// Content hash, used as a bucket key by the pipeline cache.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        rustc_hash::FxBuildHasher.hash_one(self)
    }
}

impl Hash for PropertySet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.hash(state);
    }
}

impl<K: Into<IdString>> FromIterator<(K, i32)> for PropertySet {
    fn from_iter<T: IntoIterator<Item = (K, i32)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut props = PropertySet::new();
        props.set("use_map", 1);
        props.set("max_lights", 8);

        assert!(props.contains("use_map"));
        assert!(!props.contains("use_ao_map"));
        assert_eq!(props.get("max_lights"), 8);
        assert_eq!(props.get("property_never_set"), 0);
        assert_eq!(props.get_or("property_never_set", -1), -1);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let mut props = PropertySet::new();
        props.set("a", 1);
        props.set("a", 2);
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("a"), 2);
    }

    #[test]
    fn test_insertion_order_independent() {
        let a: PropertySet = [("x", 1), ("y", 2), ("z", 3)].into_iter().collect();
        let b: PropertySet = [("z", 3), ("x", 1), ("y", 2)].into_iter().collect();

        assert_eq!(a, b);
        assert_eq!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_value_change_breaks_equality() {
        let a: PropertySet = [("x", 1)].into_iter().collect();
        let b: PropertySet = [("x", 2)].into_iter().collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_and_merge() {
        let mut d1: PropertySet = [("A", 1), ("B", 2)].into_iter().collect();
        let d2: PropertySet = [("B", 3), ("C", 4)].into_iter().collect();

        d1.merge(&d2);
        assert_eq!(d1.get("B"), 3);
        assert_eq!(d1.get("C"), 4);

        assert!(d1.remove("A"));
        assert!(!d1.remove("A"));
        assert_eq!(d1.len(), 2);
    }
}
