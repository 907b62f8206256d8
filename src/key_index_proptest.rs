#![cfg(test)]

// Property tests for KeyIndex, kept in the crate so the index does not have
// to be public outside the bench feature.

use crate::key_index::{InsertError, KeyIndex, Slot};
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Operations index into a small key pool so shrinking converges on few keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    GetOrInsert(usize, i32),
    Replace(usize, i32),
    RemoveKey(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=6).prop_flat_map(|pool| {
        let idx = proptest::sample::select((0..pool.len()).collect::<Vec<_>>());
        let known = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::GetOrInsert(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Replace(i, v)),
            idx.clone().prop_map(Op::RemoveKey),
            idx.clone().prop_map(Op::Find),
            prop_oneof![known, "[a-z]{0,4}"].prop_map(Op::Contains),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drives `sut` and a std HashMap model through the same operations.
// Invariants checked after each step:
// - Duplicate inserts fail; the default of `get_or_insert_with` runs only
//   when the key is new.
// - A slot stays valid while its key is live and never resolves after the
//   key is removed.
// - Iteration yields the model's key set; len/is_empty agree with the model.
fn run_scenario<S: BuildHasher>(
    mut sut: KeyIndex<Key, i32, S>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut live: HashMap<Key, Slot> = HashMap::new();
    let mut stale: Vec<Slot> = Vec::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = Key(pool[i].clone());
                let already = model.contains_key(&k);
                match sut.insert(k.clone(), v) {
                    Ok(slot) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        prop_assert!(live.insert(k.clone(), slot).is_none());
                        model.insert(k, v);
                    }
                    Err(InsertError::DuplicateKey) => prop_assert!(already),
                }
            }
            Op::GetOrInsert(i, v) => {
                let k = Key(pool[i].clone());
                let mut ran = false;
                let got = *sut.get_or_insert_with(k.clone(), || {
                    ran = true;
                    v
                });
                let expected = *model.entry(k.clone()).or_insert(v);
                prop_assert_eq!(got, expected);
                prop_assert_eq!(ran, !live.contains_key(&k), "default runs only for new keys");
                if ran {
                    let slot = sut.find(&k).expect("inserted key resolves");
                    live.insert(k, slot);
                }
            }
            Op::Replace(i, v) => {
                let k = Key(pool[i].clone());
                let prev = sut.replace(k.clone(), v);
                prop_assert_eq!(prev, model.insert(k.clone(), v));
                if prev.is_none() {
                    let slot = sut.find(&k).expect("inserted key resolves");
                    live.insert(k, slot);
                }
            }
            Op::RemoveKey(i) => {
                let k = Key(pool[i].clone());
                let removed = sut.remove_key(&k);
                prop_assert_eq!(removed, model.remove_entry(&k));
                if let Some(slot) = live.remove(&k) {
                    stale.push(slot);
                }
            }
            Op::Find(i) => {
                let k = Key(pool[i].clone());
                let found = sut.find(&k);
                prop_assert_eq!(found.is_some(), model.contains_key(&k));
                if let Some(slot) = found {
                    prop_assert_eq!(Some(&slot), live.get(&k), "slots are stable");
                }
            }
            Op::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            Op::Mutate(i, d) => {
                let k = Key(pool[i].clone());
                if let Some(&slot) = live.get(&k) {
                    let value = slot.value_mut(&mut sut);
                    prop_assert!(value.is_some(), "live slot should resolve");
                    if let (Some(v), Some(m)) = (value, model.get_mut(&k)) {
                        *v = v.saturating_add(d);
                        *m = m.saturating_add(d);
                    }
                }
            }
            Op::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        for slot in &stale {
            prop_assert!(slot.value(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(KeyIndex::with_hasher(RandomState::new()), &pool, ops)?;
    }
}

// Every key hashes alike, so lookups rely on equality probing alone.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(KeyIndex::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}
