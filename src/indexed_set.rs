//! IndexedSet: thread-safe key -> {values} index with set semantics per key.
//!
//! Locking is two-level. The whole-index `RwLock` guards key existence; each
//! key's value group sits behind its own `Mutex`. Appends to and removals
//! from an existing group only take the index lock shared, so work on
//! different keys runs in parallel while work on one key is strictly
//! ordered by that key's group lock. Creating or erasing a key entry takes
//! the index lock exclusively.
//!
//! Invariants
//! - A key present in the index owns a non-empty group.
//! - No value appears twice within one group.

use crate::error::{required, Error, Result};
use crate::key_index::KeyIndex;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::RandomState;
use tracing::trace;

type Group<V> = Mutex<Vec<V>>;

pub struct IndexedSet<K, V, S = RandomState> {
    groups: RwLock<KeyIndex<K, Group<V>, S>>,
}

impl<K, V> IndexedSet<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for IndexedSet<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

fn push_unique<V: PartialEq>(values: &mut Vec<V>, value: V) -> bool {
    if values.contains(&value) {
        return false;
    }
    values.push(value);
    true
}

impl<K, V, S> IndexedSet<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            groups: RwLock::new(KeyIndex::with_hasher(hasher)),
        }
    }
}

impl<K, V, S> IndexedSet<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    /// Build an index from pre-grouped values without de-duplicating them.
    /// The caller vouches for the per-key invariants; empty groups are skipped.
    pub fn from_groups<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        S: Default,
    {
        let mut index = KeyIndex::with_hasher(S::default());
        for (key, values) in groups {
            if values.is_empty() {
                continue;
            }
            index
                .get_or_insert_with(key, || Mutex::new(Vec::new()))
                .get_mut()
                .extend(values);
        }
        Self {
            groups: RwLock::new(index),
        }
    }

    /// Total number of (key, value) pairs.
    pub fn count(&self) -> usize {
        self.groups.read().values().map(|g| g.lock().len()).sum()
    }

    /// Number of values stored for `key`; `InvalidKey` when the key is absent.
    pub fn count_of<Q>(&self, key: &Q) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.groups
            .read()
            .get(key)
            .map(|g| g.lock().len())
            .ok_or(Error::InvalidKey)
    }

    pub fn key_count(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Associate `value` with `key`. Returns `false` when the pair was
    /// already present (the call is then a no-op).
    pub fn add(&self, key: impl Into<Option<K>>, value: V) -> Result<bool> {
        let key = required(key.into(), "key")?;
        Ok(self.insert(key, value))
    }

    pub(crate) fn insert(&self, key: K, value: V) -> bool {
        {
            let groups = self.groups.read();
            if let Some(group) = groups.get(&key) {
                return push_unique(&mut *group.lock(), value);
            }
        }
        let mut groups = self.groups.write();
        let group = groups.get_or_insert_with(key, || {
            trace!("indexed set: opening key group");
            Mutex::new(Vec::new())
        });
        push_unique(group.get_mut(), value)
    }

    /// Values for `key` in insertion order; empty when the key is absent.
    pub fn lookup<Q>(&self, key: &Q) -> Vec<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.groups
            .read()
            .get(key)
            .map(|g| g.lock().clone())
            .unwrap_or_default()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.groups.read().contains_key(key)
    }

    /// Whether `value` is among the values of `key`.
    pub fn contains<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.groups
            .read()
            .get(key)
            .is_some_and(|g| g.lock().contains(value))
    }

    /// Remove `key` and all of its values.
    pub fn remove<'q, Q>(&self, key: impl Into<Option<&'q Q>>) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'q,
    {
        let key = required(key.into(), "key")?;
        let removed = self.groups.write().remove_key(key).is_some();
        if removed {
            trace!("indexed set: erased key group");
        }
        Ok(removed)
    }

    /// Remove `value` from `key`'s group, erasing the key once its group is empty.
    pub fn remove_value<'q, Q>(&self, key: impl Into<Option<&'q Q>>, value: &V) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'q,
    {
        let key = required(key.into(), "key")?;
        {
            let groups = self.groups.read();
            let Some(group) = groups.get(key) else {
                return Ok(false);
            };
            let mut values = group.lock();
            if !values.contains(value) {
                return Ok(false);
            }
            if values.iter().any(|v| v != value) {
                values.retain(|v| v != value);
                return Ok(true);
            }
        }

        // The group would become empty; it may only be emptied together with
        // erasing the key, so recheck under the exclusive lock.
        let mut groups = self.groups.write();
        let Some(group) = groups.get_mut(key) else {
            return Ok(false);
        };
        let values = group.get_mut();
        let before = values.len();
        values.retain(|v| v != value);
        let removed = values.len() != before;
        if values.is_empty() {
            groups.remove_key(key);
            trace!("indexed set: erased key group");
        }
        Ok(removed)
    }

    /// Snapshot of all keys.
    pub fn keys(&self) -> impl Iterator<Item = K>
    where
        K: Clone,
    {
        self.groups.read().keys().cloned().collect::<Vec<_>>().into_iter()
    }

    /// Snapshot of every (key, value) pair, grouped by key, values in
    /// insertion order within each key.
    pub fn all(&self) -> impl Iterator<Item = (K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let groups = self.groups.read();
        let mut pairs = Vec::new();
        for (_slot, key, group) in groups.iter() {
            pairs.extend(group.lock().iter().map(|v| (key.clone(), v.clone())));
        }
        pairs.into_iter()
    }

    /// Snapshot of every key with its values.
    pub fn groups(&self) -> Vec<(K, Vec<V>)>
    where
        K: Clone,
        V: Clone,
    {
        self.groups
            .read()
            .iter()
            .map(|(_slot, key, group)| (key.clone(), group.lock().clone()))
            .collect()
    }
}

impl<K, V, S> IndexedSet<K, V, S>
where
    K: Eq + Hash,
    V: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Snapshot of all values across all keys, each reported once.
    pub fn values(&self) -> impl Iterator<Item = V> {
        let groups = self.groups.read();
        let mut seen = hashbrown::HashSet::new();
        let mut distinct = Vec::new();
        for group in groups.values() {
            for v in group.lock().iter() {
                if seen.insert(v.clone()) {
                    distinct.push(v.clone());
                }
            }
        }
        distinct.into_iter()
    }
}

impl<K, V, S> core::fmt::Debug for IndexedSet<K, V, S>
where
    K: core::fmt::Debug,
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let groups = self.groups.read();
        let mut map = f.debug_map();
        for (_slot, key, group) in groups.iter() {
            map.entry(key, &*group.lock());
        }
        map.finish()
    }
}
