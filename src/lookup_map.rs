//! LookupMap: many-to-many relation kept as a forward and a reverse `Lookup`.
//!
//! Writers hold the relation-wide gate exclusively while they update both
//! sides; readers hold it shared. A reader therefore never observes one side
//! of a pair without the other.
//!
//! Invariant: `b in forward[a]` iff `a in reverse[b]`.

use crate::error::{required, Result};
use crate::lookup::Lookup;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use parking_lot::RwLock;
use std::collections::hash_map::RandomState;
use tracing::trace;

pub struct LookupMap<T1, T2, S = RandomState> {
    forward: Lookup<T1, T2, S>,
    reverse: Lookup<T2, T1, S>,
    gate: RwLock<()>,
}

impl<T1, T2> LookupMap<T1, T2>
where
    T1: Eq + Hash,
    T2: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<T1, T2> Default for LookupMap<T1, T2>
where
    T1: Eq + Hash,
    T2: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T1, T2, S> LookupMap<T1, T2, S>
where
    T1: Eq + Hash,
    T2: Eq + Hash,
    S: BuildHasher + Clone,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_parts(
            Lookup::with_hasher(hasher.clone()),
            Lookup::with_hasher(hasher),
        )
    }
}

impl<T1, T2, S> LookupMap<T1, T2, S>
where
    T1: Eq + Hash,
    T2: Eq + Hash,
    S: BuildHasher,
{
    /// Build from pre-filled lookups without checking them against each
    /// other. Intended for seeding test fixtures; the caller guarantees that
    /// `reverse` mirrors `forward`.
    pub fn from_parts(forward: Lookup<T1, T2, S>, reverse: Lookup<T2, T1, S>) -> Self {
        Self {
            forward,
            reverse,
            gate: RwLock::new(()),
        }
    }

    pub fn into_parts(self) -> (Lookup<T1, T2, S>, Lookup<T2, T1, S>) {
        (self.forward, self.reverse)
    }
}

impl<T1, T2, S> LookupMap<T1, T2, S>
where
    T1: Eq + Hash + Clone,
    T2: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Link `t1` with `t2` on both sides. Re-adding an existing pair is a
    /// no-op and returns `Ok(false)`.
    pub fn add(&self, t1: impl Into<Option<T1>>, t2: impl Into<Option<T2>>) -> Result<bool> {
        let t1 = required(t1.into(), "t1")?;
        let t2 = required(t2.into(), "t2")?;
        Ok(self.link(t1, t2))
    }

    fn link(&self, t1: T1, t2: T2) -> bool {
        let _gate = self.gate.write();
        let added = self.forward.insert(t1.clone(), t2.clone());
        let mirrored = self.reverse.insert(t2, t1);
        debug_assert_eq!(added, mirrored, "forward and reverse sides diverged");
        added
    }

    /// Unlink `t1` from `t2` on both sides, erasing either key once it has
    /// no partners left.
    pub fn remove<'q>(
        &self,
        t1: impl Into<Option<&'q T1>>,
        t2: impl Into<Option<&'q T2>>,
    ) -> Result<bool>
    where
        T1: 'q,
        T2: 'q,
    {
        let t1 = required(t1.into(), "t1")?;
        let t2 = required(t2.into(), "t2")?;
        let _gate = self.gate.write();
        let removed = self.forward.remove_value(t1, t2)?;
        let mirrored = self.reverse.remove_value(t2, t1)?;
        debug_assert_eq!(removed, mirrored, "forward and reverse sides diverged");
        Ok(removed)
    }

    /// Total number of pairs.
    pub fn count(&self) -> usize {
        let _gate = self.gate.read();
        self.forward.count()
    }

    pub fn is_empty(&self) -> bool {
        let _gate = self.gate.read();
        self.forward.is_empty()
    }

    /// Whether the pair `(t1, t2)` is linked.
    pub fn contains<Q>(&self, t1: &Q, t2: &T2) -> bool
    where
        T1: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _gate = self.gate.read();
        self.forward.contains(t1, t2)
    }

    /// Whether `t1` has any partner and `t2` has any partner, checked
    /// independently. This does not imply `(t1, t2)` is linked; use
    /// [`LookupMap::contains`] for that.
    pub fn contains_keys<Q1, Q2>(&self, t1: &Q1, t2: &Q2) -> bool
    where
        T1: Borrow<Q1>,
        T2: Borrow<Q2>,
        Q1: ?Sized + Hash + Eq,
        Q2: ?Sized + Hash + Eq,
    {
        let _gate = self.gate.read();
        self.forward.contains_key(t1) && self.reverse.contains_key(t2)
    }

    /// View keyed by the left domain.
    pub fn forward(&self) -> LookupSide<'_, T1, T2, S, impl Fn(&T1, &T2) -> Result<bool> + '_> {
        LookupSide {
            index: &self.forward,
            gate: &self.gate,
            unlink: move |t1: &T1, t2: &T2| self.remove(t1, t2),
        }
    }

    /// View keyed by the right domain.
    pub fn reverse(&self) -> LookupSide<'_, T2, T1, S, impl Fn(&T2, &T1) -> Result<bool> + '_> {
        LookupSide {
            index: &self.reverse,
            gate: &self.gate,
            unlink: move |t2: &T2, t1: &T1| self.remove(t1, t2),
        }
    }

    /// Snapshot of every pair, grouped by left element.
    pub fn all(&self) -> impl Iterator<Item = (T1, T2)> {
        let _gate = self.gate.read();
        self.forward.all()
    }

    /// Snapshot of every left element that has at least one partner.
    pub fn all_left(&self) -> impl Iterator<Item = T1> {
        let _gate = self.gate.read();
        self.forward.keys()
    }

    /// Snapshot of every right element that has at least one partner.
    pub fn all_right(&self) -> impl Iterator<Item = T2> {
        let _gate = self.gate.read();
        self.reverse.keys()
    }
}

impl<T1, T2, S> FromIterator<(T1, T2)> for LookupMap<T1, T2, S>
where
    T1: Eq + Hash + Clone,
    T2: Eq + Hash + Clone,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (T1, T2)>>(iter: I) -> Self {
        let map = Self::with_hasher(S::default());
        for (t1, t2) in iter {
            map.link(t1, t2);
        }
        map
    }
}

impl<T1, T2, S> core::fmt::Debug for LookupMap<T1, T2, S>
where
    T1: core::fmt::Debug,
    T2: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let _gate = self.gate.read();
        core::fmt::Debug::fmt(&self.forward, f)
    }
}

/// One side of a [`LookupMap`]. Reads go to this side's lookup; removing a
/// key fans out through `unlink` so every pair it takes part in leaves both
/// sides.
pub struct LookupSide<'a, A, B, S, R> {
    index: &'a Lookup<A, B, S>,
    gate: &'a RwLock<()>,
    unlink: R,
}

impl<'a, A, B, S, R> LookupSide<'a, A, B, S, R>
where
    A: Eq + Hash,
    B: PartialEq + Clone,
    S: BuildHasher,
    R: Fn(&A, &B) -> Result<bool>,
{
    /// Partners of `key`; empty when the key is absent.
    pub fn get<Q>(&self, key: &Q) -> Vec<B>
    where
        A: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _gate = self.gate.read();
        self.index.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        A: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _gate = self.gate.read();
        self.index.contains_key(key)
    }

    /// Remove every pair `key` takes part in from both sides. Returns the
    /// number of pairs removed; 0 when the key is absent.
    pub fn remove<'q>(&self, key: impl Into<Option<&'q A>>) -> Result<usize>
    where
        A: 'q,
    {
        let key = required(key.into(), "key")?;
        // The group shrinks as pairs go, so walk a snapshot of it.
        let partners = {
            let _gate = self.gate.read();
            self.index.get(key)
        };
        let mut removed = 0;
        for partner in &partners {
            if (self.unlink)(key, partner)? {
                removed += 1;
            }
        }
        if removed > 0 {
            trace!(removed, "lookup map: removed key from both sides");
        }
        Ok(removed)
    }
}
