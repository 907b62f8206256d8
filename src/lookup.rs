//! Lookup: public one-to-many relation over a single `IndexedSet`.

use crate::error::Result;
use crate::indexed_set::IndexedSet;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

/// One-to-many relation. Each key owns an ordered, duplicate-free group of
/// values; a key with no values does not exist.
///
/// All operations take `&self` and are safe to call from many threads.
pub struct Lookup<K, V, S = RandomState> {
    index: IndexedSet<K, V, S>,
}

impl<K, V> Lookup<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            index: IndexedSet::new(),
        }
    }
}

impl<K, V> Default for Lookup<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Lookup<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            index: IndexedSet::with_hasher(hasher),
        }
    }

    /// Wrap an already built index. Intended for seeding test fixtures.
    pub fn from_index(index: IndexedSet<K, V, S>) -> Self {
        Self { index }
    }

    pub fn into_index(self) -> IndexedSet<K, V, S> {
        self.index
    }
}

impl<K, V, S> Lookup<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    /// Seed from pre-grouped values; see [`IndexedSet::from_groups`].
    pub fn from_groups<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        S: Default,
    {
        Self::from_index(IndexedSet::from_groups(groups))
    }

    /// Total number of (key, value) pairs.
    pub fn count(&self) -> usize {
        self.index.count()
    }

    /// Number of values for `key`; fails with `InvalidKey` if the key is absent.
    pub fn count_of<Q>(&self, key: &Q) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.count_of(key)
    }

    pub fn key_count(&self) -> usize {
        self.index.key_count()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Add `value` under `key`. Re-adding an existing pair returns `Ok(false)`.
    pub fn add(&self, key: impl Into<Option<K>>, value: V) -> Result<bool> {
        self.index.add(key, value)
    }

    pub(crate) fn insert(&self, key: K, value: V) -> bool {
        self.index.insert(key, value)
    }

    /// Values for `key` in insertion order, or empty if the key is absent.
    pub fn get<Q>(&self, key: &Q) -> Vec<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.index.lookup(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.contains_key(key)
    }

    pub fn contains<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.contains(key, value)
    }

    /// Remove every value for `key`.
    pub fn remove<'q, Q>(&self, key: impl Into<Option<&'q Q>>) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'q,
    {
        self.index.remove(key)
    }

    /// Remove one value from `key`; the key disappears with its last value.
    pub fn remove_value<'q, Q>(&self, key: impl Into<Option<&'q Q>>, value: &V) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'q,
    {
        self.index.remove_value(key, value)
    }

    pub fn keys(&self) -> impl Iterator<Item = K>
    where
        K: Clone,
    {
        self.index.keys()
    }

    pub fn all(&self) -> impl Iterator<Item = (K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.index.all()
    }

    pub fn groups(&self) -> Vec<(K, Vec<V>)>
    where
        K: Clone,
        V: Clone,
    {
        self.index.groups()
    }
}

impl<K, V, S> Lookup<K, V, S>
where
    K: Eq + Hash,
    V: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Distinct values across all keys, in first-seen order.
    pub fn values(&self) -> impl Iterator<Item = V> {
        self.index.values()
    }
}

impl<K, V, S> From<IndexedSet<K, V, S>> for Lookup<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn from(index: IndexedSet<K, V, S>) -> Self {
        Self::from_index(index)
    }
}

impl<K, V, S> Extend<(K, V)> for Lookup<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.index.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for Lookup<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut lookup = Self::with_hasher(S::default());
        lookup.extend(iter);
        lookup
    }
}

impl<K, V, S> core::fmt::Debug for Lookup<K, V, S>
where
    K: core::fmt::Debug,
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.index, f)
    }
}
