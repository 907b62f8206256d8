//! Map: bijection between two domains kept as two plain key -> value indices.
//!
//! Every structural change takes the forward lock and then the reverse
//! lock for its whole duration, so changes to the pair of indices are
//! serialized globally. Readers take one side's lock shared.
//!
//! Invariant: `forward[a] == b` iff `reverse[b] == a`.

use crate::error::{required, Error, Result};
use crate::key_index::KeyIndex;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use parking_lot::RwLock;
use std::collections::hash_map::RandomState;
use tracing::trace;

pub struct Map<T1, T2, S = RandomState> {
    forward: RwLock<KeyIndex<T1, T2, S>>,
    reverse: RwLock<KeyIndex<T2, T1, S>>,
}

impl<T1, T2> Map<T1, T2>
where
    T1: Eq + Hash,
    T2: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<T1, T2> Default for Map<T1, T2>
where
    T1: Eq + Hash,
    T2: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T1, T2, S> Map<T1, T2, S>
where
    T1: Eq + Hash,
    T2: Eq + Hash,
    S: BuildHasher + Clone,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            forward: RwLock::new(KeyIndex::with_hasher(hasher.clone())),
            reverse: RwLock::new(KeyIndex::with_hasher(hasher)),
        }
    }

    /// Build from pre-filled indices without checking them against each
    /// other. Intended for seeding test fixtures; the caller guarantees the
    /// two sides describe the same bijection. Repeated keys are not
    /// rejected: a later pair overwrites an earlier one on its side.
    pub fn from_parts<F, R>(forward: F, reverse: R) -> Self
    where
        F: IntoIterator<Item = (T1, T2)>,
        R: IntoIterator<Item = (T2, T1)>,
        S: Default,
    {
        let map = Self::with_hasher(S::default());
        map.forward.write().extend(forward);
        map.reverse.write().extend(reverse);
        map
    }
}

impl<T1, T2, S> Map<T1, T2, S>
where
    T1: Eq + Hash + Clone,
    T2: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Build by adding each pair in turn; stops at the first conflict.
    pub fn try_from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T1, T2)>,
        S: Clone + Default,
    {
        let map = Self::with_hasher(S::default());
        for (t1, t2) in pairs {
            map.add(t1, t2)?;
        }
        Ok(map)
    }

    /// Link `t1` with `t2`. Fails with `DuplicateKey` when either side is
    /// already mapped; nothing is inserted in that case.
    pub fn add(&self, t1: impl Into<Option<T1>>, t2: impl Into<Option<T2>>) -> Result<()> {
        let t1 = required(t1.into(), "t1")?;
        let t2 = required(t2.into(), "t2")?;

        let mut forward = self.forward.write();
        let mut reverse = self.reverse.write();
        if forward.contains_key(&t1) || reverse.contains_key(&t2) {
            trace!("map: rejected conflicting pair");
            return Err(Error::DuplicateKey);
        }
        forward.insert(t1.clone(), t2.clone())?;
        reverse.insert(t2, t1)?;
        trace!(pairs = forward.len(), "map: linked pair");
        Ok(())
    }

    /// Shared two-sided removal. Only removes `(t1, t2)` if both sides still
    /// hold exactly that pair.
    fn unlink(&self, t1: &T1, t2: &T2) -> bool {
        let mut forward = self.forward.write();
        let mut reverse = self.reverse.write();
        let linked = forward.get(t1) == Some(t2) && reverse.get(t2) == Some(t1);
        if linked {
            forward.remove_key(t1);
            reverse.remove_key(t2);
            trace!(pairs = forward.len(), "map: unlinked pair");
        }
        linked
    }

    /// Number of pairs.
    pub fn count(&self) -> usize {
        self.forward.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.read().is_empty()
    }

    /// View keyed by the left domain.
    pub fn forward(&self) -> MapSide<'_, T1, T2, S, impl Fn(&T1, &T2) -> bool + '_> {
        MapSide {
            index: &self.forward,
            unlink: move |t1: &T1, t2: &T2| self.unlink(t1, t2),
        }
    }

    /// View keyed by the right domain.
    pub fn reverse(&self) -> MapSide<'_, T2, T1, S, impl Fn(&T2, &T1) -> bool + '_> {
        MapSide {
            index: &self.reverse,
            unlink: move |t2: &T2, t1: &T1| self.unlink(t1, t2),
        }
    }

    /// Snapshot of every left element.
    pub fn all_left(&self) -> impl Iterator<Item = T1> {
        self.forward.read().keys().cloned().collect::<Vec<_>>().into_iter()
    }

    /// Snapshot of every right element.
    pub fn all_right(&self) -> impl Iterator<Item = T2> {
        self.reverse.read().keys().cloned().collect::<Vec<_>>().into_iter()
    }

    /// Snapshot of every pair.
    pub fn all(&self) -> impl Iterator<Item = (T1, T2)> {
        self.forward
            .read()
            .iter()
            .map(|(_slot, t1, t2)| (t1.clone(), t2.clone()))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl<T1, T2, S> core::fmt::Debug for Map<T1, T2, S>
where
    T1: core::fmt::Debug,
    T2: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&*self.forward.read(), f)
    }
}

/// One side of a [`Map`]. Reads go to this side's index; removal resolves
/// the partner through this side and then runs the map's shared two-sided
/// removal bound into `unlink`.
pub struct MapSide<'a, A, B, S, R> {
    index: &'a RwLock<KeyIndex<A, B, S>>,
    unlink: R,
}

impl<'a, A, B, S, R> MapSide<'a, A, B, S, R>
where
    A: Eq + Hash + Clone,
    B: PartialEq + Clone,
    S: BuildHasher,
    R: Fn(&A, &B) -> bool,
{
    /// Partner of `key`; fails with `KeyNotFound` when `key` is not mapped.
    pub fn get<Q>(&self, key: &Q) -> Result<B>
    where
        A: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.read().get(key).cloned().ok_or(Error::KeyNotFound)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        A: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.read().contains_key(key)
    }

    /// Remove the pair `key` belongs to from both sides. Absent keys are a
    /// no-op and return `Ok(false)`.
    ///
    /// A half pair, present on this side but not mirrored on the other (only
    /// reachable through an inconsistent [`Map::from_parts`] seed), is left
    /// in place and reported as `Ok(false)`.
    pub fn remove<'q, Q>(&self, key: impl Into<Option<&'q Q>>) -> Result<bool>
    where
        A: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'q,
    {
        let key = required(key.into(), "key")?;
        let mut rejected: Option<(A, B)> = None;
        loop {
            let pair = {
                let guard = self.index.read();
                let index = &*guard;
                let found = index.find(key).and_then(|slot| {
                    Some((slot.key(index)?.clone(), slot.value(index)?.clone()))
                });
                found
            };
            let Some((a, b)) = pair else {
                return Ok(false);
            };
            // Same partner as the failed attempt: the sides disagree.
            if rejected.as_ref() == Some(&(a.clone(), b.clone())) {
                trace!("map: left unmirrored half pair in place");
                return Ok(false);
            }
            if (self.unlink)(&a, &b) {
                return Ok(true);
            }
            // A concurrent change may have relinked `a` in between; look again.
            rejected = Some((a, b));
        }
    }
}
