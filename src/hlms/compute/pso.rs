//! Compute pipeline state objects and their cache.
//!
//! The cache is a contiguous `Vec` addressed by [`PsoCacheIndex`], with a
//! fingerprint-hash accelerator in front of it. A hash hit is only a
//! candidate: entries are always confirmed by comparing the property sets, so
//! the cache key is the property-set *value*. Two jobs built from different
//! templates share an entry whenever their properties are equal.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::hlms::program_cache::ProgramHandle;
use crate::hlms::property::PropertySet;
use crate::render_system::PsoId;

/// Index of a [`PsoCacheEntry`] inside [`ComputePsoCache`].
///
/// Jobs remember the index of their entry. [`PsoCacheIndex::INVALID`] lies
/// beyond any cache length, so a reset index behaves like a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PsoCacheIndex(pub(crate) u32);

impl PsoCacheIndex {
    pub const INVALID: Self = Self(u32::MAX);

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for PsoCacheIndex {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A compiled compute pipeline.
#[derive(Debug, Clone)]
pub struct ComputePso {
    /// `None` when expansion failed or the template disabled the stage.
    pub program: Option<ProgramHandle>,
    pub threads_per_group: [u32; 3],
    pub num_thread_groups: [u32; 3],
    /// Render-system side pipeline.
    pub backend: PsoId,
}

/// A [`ComputePso`] together with the fingerprint that produced it.
#[derive(Debug, Clone)]
pub struct PsoCacheEntry {
    pub properties: PropertySet,
    pub pso: ComputePso,
}

#[derive(Debug, Default)]
pub struct ComputePsoCache {
    entries: Vec<PsoCacheEntry>,
    lookup: FxHashMap<u64, SmallVec<[PsoCacheIndex; 1]>>,
}

impl ComputePsoCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the entry whose properties equal `properties`.
    #[must_use]
    pub fn find(&self, properties: &PropertySet) -> Option<PsoCacheIndex> {
        self.lookup
            .get(&properties.compute_hash())?
            .iter()
            .copied()
            .find(|index| self.entries[index.index()].properties == *properties)
    }

    /// Appends an entry and returns its index.
    pub fn push(&mut self, properties: PropertySet, pso: ComputePso) -> PsoCacheIndex {
        let index = PsoCacheIndex(self.entries.len() as u32);
        self.lookup
            .entry(properties.compute_hash())
            .or_default()
            .push(index);
        self.entries.push(PsoCacheEntry { properties, pso });
        index
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: PsoCacheIndex) -> Option<&PsoCacheEntry> {
        self.entries.get(index.index())
    }

    /// Whether `index` addresses a live entry.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: PsoCacheIndex) -> bool {
        index.index() < self.entries.len()
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

    pub fn iter(&self) -> impl Iterator<Item = &PsoCacheEntry> {
        self.entries.iter()
    }

    /// Removes every entry, yielding them so their pipelines can be destroyed.
    pub fn drain(&mut self) -> impl Iterator<Item = PsoCacheEntry> + '_ {
        self.lookup.clear();
        self.entries.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pso() -> ComputePso {
        ComputePso {
            program: None,
            threads_per_group: [64, 1, 1],
            num_thread_groups: [1, 1, 1],
            backend: PsoId::default(),
        }
    }

    #[test]
    fn lookup_is_by_value() {
        let mut cache = ComputePsoCache::new();
        let a: PropertySet = [("x", 1), ("y", 2)].into_iter().collect();
        let index = cache.push(a, pso());

        let b: PropertySet = [("y", 2), ("x", 1)].into_iter().collect();
        assert_eq!(cache.find(&b), Some(index));

        let c: PropertySet = [("y", 2), ("x", 3)].into_iter().collect();
        assert_eq!(cache.find(&c), None);
    }

    #[test]
    fn subset_of_properties_misses() {
        let mut cache = ComputePsoCache::new();
        let full: PropertySet = [("x", 1), ("y", 0)].into_iter().collect();
        cache.push(full, pso());

        let partial: PropertySet = [("x", 1)].into_iter().collect();
        assert_eq!(cache.find(&partial), None);
    }

    #[test]
    fn invalid_index_is_never_contained() {
        let mut cache = ComputePsoCache::new();
        cache.push(PropertySet::new(), pso());
        assert!(cache.contains(PsoCacheIndex(0)));
        assert!(!cache.contains(PsoCacheIndex::INVALID));

        assert_eq!(cache.drain().count(), 1);
        assert!(!cache.contains(PsoCacheIndex(0)));
        assert_eq!(cache.find(&PropertySet::new()), None);
    }
}
