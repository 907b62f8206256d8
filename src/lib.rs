//! dual-index: thread-safe relations between two domains, each kept as a
//! pair of mutually consistent indices so both directions resolve in O(1).
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the relations in small layers so each invariant lives in
//!   exactly one place.
//! - Layers:
//!   - KeyIndex<K, V, S>: single-threaded structural map handing out stable
//!     slots; owns hashing and probing and nothing else.
//!   - IndexedSet<K, V, S>: KeyIndex of per-key value groups. Values under
//!     one key are ordered and duplicate-free; a key exists only while its
//!     group is non-empty.
//!   - Lookup<K, V, S>: public one-to-many relation over an IndexedSet.
//!   - Map<T1, T2, S>: one-to-one relation over a forward and a reverse
//!     KeyIndex, each behind its own lock.
//!   - LookupMap<T1, T2, S>: many-to-many relation over a forward and a
//!     reverse Lookup.
//!   - Equatable / ByFields: structural equality over opted-in fields, so
//!     plain records can key any relation.
//!
//! Constraints
//! - Every relation is `Send + Sync` when its element types are, and every
//!   operation takes `&self`.
//! - Two-sided invariants: for Map, `forward[a] == b` iff
//!   `reverse[b] == a`; for LookupMap, `b in forward[a]` iff
//!   `a in reverse[b]`. No reader observes them broken.
//! - Absent arguments (`None`) are rejected with `Error::NullArgument`
//!   before anything is mutated.
//!
//! Locking policy
//! - IndexedSet: one `RwLock` over the key index, one `Mutex` per value
//!   group. Work on an existing key takes the index lock shared; creating
//!   or erasing a key takes it exclusively.
//! - Map: structural changes lock forward and then reverse, always in that
//!   order. Reads lock one side shared.
//! - LookupMap: a relation-wide gate. Writers hold it exclusively across
//!   both sides; readers hold it shared.
//! - No lock is held while user callbacks run, other than `K: Eq + Hash`
//!   and `V: PartialEq` during probing.
//!
//! Iteration
//! - Enumerations (`keys`, `all`, `all_left`, ...) return snapshots taken
//!   under the relevant locks; later changes do not affect an iterator
//!   already handed out.
//!
//! Notes and non-goals
//! - No persistence and no serialization.
//! - Map has no setter through a side; re-pointing a key goes through
//!   remove + add so the bijection is checked.
//! - Public API surface is the relations, their side views, the errors and
//!   the equality helper; KeyIndex is an implementation detail.

mod equatable;
mod error;
mod indexed_set;
#[cfg(feature = "bench_internal")]
pub mod key_index;
#[cfg(not(feature = "bench_internal"))]
mod key_index;
mod key_index_proptest;
mod lookup;
mod lookup_map;
mod map;

// Public surface
pub use equatable::{try_eq, try_hash, ByFields, Equatable, FieldList};
pub use error::{Error, Result};
pub use indexed_set::IndexedSet;
pub use key_index::InsertError;
pub use lookup::Lookup;
pub use lookup_map::{LookupMap, LookupSide};
pub use map::{Map, MapSide};
