use std::collections::BTreeSet;

use crate::OrderedSet;

impl<K: Ord> OrderedSet<K> for BTreeSet<K> {
    fn add(&mut self, key: K) -> bool {
        self.insert(key)
    }
    fn remove(&mut self, key: &K) -> bool {
        BTreeSet::remove(self, key)
    }
    fn contains(&self, key: &K) -> bool {
        BTreeSet::contains(self, key)
    }
    fn len(&self) -> usize {
        BTreeSet::len(self)
    }
}

/// An ordered set stored as a sorted, deduplicated vector.
///
/// Lookups are binary searches; insertions and removals shift the tail. Cheap to scan in order,
/// which makes it a good fit for small, read-mostly sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortedVec<K> {
    keys: Vec<K>,
}

impl<K> Default for SortedVec<K> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<K: Ord> SortedVec<K> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The keys in ascending order.
    pub fn as_slice(&self) -> &[K] {
        &self.keys
    }

    /// Iterate over the keys in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.keys.iter()
    }
}

impl<K: Ord> OrderedSet<K> for SortedVec<K> {
    fn add(&mut self, key: K) -> bool {
        match self.keys.binary_search(&key) {
            Ok(_) => false,
            Err(index) => {
                self.keys.insert(index, key);
                true
            }
        }
    }
    fn remove(&mut self, key: &K) -> bool {
        match self.keys.binary_search(key) {
            Ok(index) => {
                self.keys.remove(index);
                true
            }
            Err(_) => false,
        }
    }
    fn contains(&self, key: &K) -> bool {
        self.keys.binary_search(key).is_ok()
    }
    fn len(&self) -> usize {
        self.keys.len()
    }
}

impl<K: Ord> FromIterator<K> for SortedVec<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut keys: Vec<K> = iter.into_iter().collect();
        keys.sort();
        keys.dedup();
        Self { keys }
    }
}
