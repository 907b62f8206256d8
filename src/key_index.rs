//! KeyIndex: structural key -> value store with stable slot handles.
//!
//! Every relation in this crate bottoms out in a `KeyIndex`. It is not
//! synchronized; the layers above own the locks.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Generational handle to an entry. A handle never resolves to a different
/// entry once its own entry has been removed, even if the slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Slot(DefaultKey);

impl Slot {
    pub fn key<'a, K, V, S>(&self, index: &'a KeyIndex<K, V, S>) -> Option<&'a K> {
        index.slots.get(self.0).map(|e| &e.key)
    }

    pub fn value<'a, K, V, S>(&self, index: &'a KeyIndex<K, V, S>) -> Option<&'a V> {
        index.slots.get(self.0).map(|e| &e.value)
    }

    pub fn value_mut<'a, K, V, S>(&self, index: &'a mut KeyIndex<K, V, S>) -> Option<&'a mut V> {
        index.slots.get_mut(self.0).map(|e| &mut e.value)
    }
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

pub struct KeyIndex<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertError {
    DuplicateKey,
}

impl<K, V> KeyIndex<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for KeyIndex<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over entries in slot order.
pub struct Iter<'a, K, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Slot, &'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(k, e)| (Slot(k), &e.key, &e.value))
    }
}

// Slot-only accessors; they never hash or compare keys.
impl<K, V, S> KeyIndex<K, V, S> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.slots.iter(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.slots.values().map(|e| &e.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.slots.values().map(|e| &e.value)
    }
}

impl<K, V, S> KeyIndex<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Slot>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .map(|&k| Slot(k))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).and_then(|slot| slot.value(self))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find(q)?;
        slot.value_mut(self)
    }

    /// Insert a new key; an existing key is a conflict and leaves the index untouched.
    pub fn insert(&mut self, key: K, value: V) -> Result<Slot, InsertError> {
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&kk| self.slots.get(kk).map(|e| e.key == key).unwrap_or(false),
            |&kk| self.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let k = self.slots.insert(Entry { key, value, hash });
                let _ = v.insert(k);
                Ok(Slot(k))
            }
        }
    }

    /// Return the value for `key`, inserting `default()` first when absent.
    /// `default` only runs on insertion.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        let k = match self.index.entry(
            hash,
            |&kk| self.slots.get(kk).map(|e| e.key == key).unwrap_or(false),
            |&kk| self.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(o) => *o.get(),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let value = default();
                let k = self.slots.insert(Entry { key, value, hash });
                let _ = v.insert(k);
                k
            }
        };
        &mut self.slots[k].value
    }

    /// Insert or overwrite; returns the previous value for `key`.
    pub fn replace(&mut self, key: K, value: V) -> Option<V> {
        match self.find(&key) {
            Some(slot) => slot
                .value_mut(self)
                .map(|old| core::mem::replace(old, value)),
            None => {
                let _ = self.insert(key, value);
                None
            }
        }
    }

    pub fn remove(&mut self, slot: Slot) -> Option<(K, V)> {
        let k = slot.0;
        let entry = self.slots.remove(k)?;
        self.index
            .find_entry(entry.hash, |&kk| kk == k)
            .expect("live slot must be indexed")
            .remove();
        Some((entry.key, entry.value))
    }

    pub fn remove_key<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find(q)?;
        self.remove(slot)
    }
}

impl<K, V, S> Extend<(K, V)> for KeyIndex<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.replace(key, value);
        }
    }
}

impl<K, V, S> core::fmt::Debug for KeyIndex<K, V, S>
where
    K: core::fmt::Debug,
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.slots.values().map(|e| (&e.key, &e.value)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::BTreeSet;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl core::hash::Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }

    /// Invariant: Duplicate keys are rejected and the index remains unchanged.
    #[test]
    fn duplicate_insert_rejected() {
        let mut m: KeyIndex<String, i32> = KeyIndex::new();
        let slot = m.insert("dup".to_string(), 1).unwrap();
        match m.insert("dup".to_string(), 2) {
            Err(InsertError::DuplicateKey) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(slot.value(&m), Some(&1));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: Borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: KeyIndex<String, i32> = KeyIndex::new();
        m.insert("hello".to_string(), 1).unwrap();
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert_eq!(m.get("hello"), Some(&1));
        assert!(m.get("world").is_none());
    }

    /// Invariant: Removing an entry invalidates its slot and does not alias a new
    /// entry inserted afterward, even if the physical slot is reused.
    #[test]
    fn stale_slot_does_not_alias_new_entry() {
        let mut m: KeyIndex<String, i32> = KeyIndex::new();
        let s1 = m.insert("old".to_string(), 1).unwrap();
        let _ = m.remove(s1).unwrap();
        let s2 = m.insert("new".to_string(), 2).unwrap();
        assert_ne!(s1, s2, "slots must differ across generations");
        assert!(s1.value(&m).is_none(), "stale slot must not resolve");
        assert!(m.remove(s1).is_none());
        assert!(m.contains_key("new"));
        assert!(!m.contains_key("old"));
    }

    /// Invariant: `get_or_insert_with` runs the constructor only for a new key
    /// and hands back the stored value either way.
    #[test]
    fn get_or_insert_with_is_lazy() {
        let mut m: KeyIndex<&'static str, Vec<i32>> = KeyIndex::new();
        let calls = Cell::new(0);

        m.get_or_insert_with("k", || {
            calls.set(calls.get() + 1);
            Vec::new()
        })
        .push(1);
        m.get_or_insert_with("k", || {
            calls.set(calls.get() + 1);
            Vec::new()
        })
        .push(2);

        assert_eq!(calls.get(), 1);
        assert_eq!(m.get(&"k"), Some(&vec![1, 2]));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn replace_overwrites_and_reports_previous() {
        let mut m: KeyIndex<&'static str, i32> = KeyIndex::new();
        assert_eq!(m.replace("a", 1), None);
        assert_eq!(m.replace("a", 2), Some(1));
        assert_eq!(m.get(&"a"), Some(&2));
        assert_eq!(m.len(), 1);

        m.extend([("b", 3), ("a", 4)]);
        assert_eq!(m.get(&"a"), Some(&4));
        assert_eq!(m.get(&"b"), Some(&3));
    }

    /// Invariant: Lookups work under heavy hash collisions; equality resolves to the
    /// correct entry and removal unlinks only the targeted entry.
    #[test]
    fn collision_handling_with_const_hasher() {
        let mut m: KeyIndex<String, i32, ConstBuildHasher> =
            KeyIndex::with_hasher(ConstBuildHasher);
        m.insert("a".to_string(), 1).unwrap();
        m.insert("b".to_string(), 2).unwrap();
        m.insert("c".to_string(), 3).unwrap();

        let sa = m.find("a").expect("find a");
        let sb = m.find("b").expect("find b");
        assert_ne!(sa, sb);
        assert_eq!(sa.key(&m), Some(&"a".to_string()));
        assert_eq!(sb.key(&m), Some(&"b".to_string()));

        assert_eq!(m.remove_key("b"), Some(("b".to_string(), 2)));
        assert_eq!(m.get("a"), Some(&1));
        assert_eq!(m.get("c"), Some(&3));
        assert!(!m.contains_key("b"));
    }

    // Test: the read-only accessors need no key or hasher bounds, so generic
    // callers like Debug impls can use them.
    #[test]
    fn accessors_work_without_hash_bounds() {
        fn summarize<K: Clone, V: Copy, S>(m: &KeyIndex<K, V, S>) -> (usize, Vec<K>, Vec<V>) {
            assert_eq!(m.is_empty(), m.len() == 0);
            let values = m.iter().map(|(_s, _k, v)| *v).collect();
            (m.len(), m.keys().cloned().collect(), values)
        }

        let mut m: KeyIndex<&str, u8> = KeyIndex::new();
        m.insert("x", 1).unwrap();
        m.insert("y", 2).unwrap();
        assert_eq!(summarize(&m), (2, vec!["x", "y"], vec![1, 2]));
        assert_eq!(format!("{m:?}"), r#"{"x": 1, "y": 2}"#);
    }

    /// Invariant: Iteration yields each live entry exactly once, in slot order
    /// while no slot has been freed.
    #[test]
    fn iteration_follows_insertion_without_removals() {
        let mut m: KeyIndex<String, i32> = KeyIndex::new();
        let keys = ["k1", "k2", "k3"];
        for (i, k) in keys.iter().enumerate() {
            m.insert((*k).to_string(), i as i32).unwrap();
        }

        let seen: Vec<&str> = m.keys().map(String::as_str).collect();
        assert_eq!(seen, keys);
        let values: Vec<i32> = m.values().copied().collect();
        assert_eq!(values, [0, 1, 2]);

        let _ = m.remove_key("k2");
        let seen: BTreeSet<String> = m.iter().map(|(_s, k, _v)| k.clone()).collect();
        let expected: BTreeSet<String> = ["k1", "k3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(seen, expected);
    }

    /// Invariant: `len()` and `is_empty()` reflect the number of live entries,
    /// unaffected by failed duplicate inserts, and updated after removals.
    #[test]
    fn len_and_is_empty_behaviors() {
        let mut m: KeyIndex<String, i32> = KeyIndex::new();
        assert_eq!(m.len(), 0);
        assert!(m.is_empty());

        let s1 = m.insert("a".to_string(), 1).unwrap();
        assert!(m.insert("a".to_string(), 2).is_err());
        assert_eq!(m.len(), 1);

        let s2 = m.insert("b".to_string(), 2).unwrap();
        assert_eq!(m.len(), 2);

        let _ = m.remove(s1).unwrap();
        assert_eq!(m.len(), 1);
        assert!(!m.is_empty());

        let _ = m.remove(s2).unwrap();
        assert!(m.is_empty());
    }
}
