//! Structural equality over an explicitly opted-in list of fields.
//!
//! A type implements [`Equatable`] by listing the fields that take part in
//! equality and hashing. The list is built once per type on first use and
//! cached process-wide by `TypeId`; later comparisons reuse it. Wrapping a
//! value in [`ByFields`] gives it `PartialEq + Eq + Hash` from that list, so
//! it can key any of the relations in this crate.
//!
//! ```
//! use dual_index::{ByFields, Equatable, FieldList};
//!
//! struct Account {
//!     id: u64,
//!     region: String,
//!     last_seen: u64,
//! }
//!
//! impl Equatable for Account {
//!     fn fields(list: &mut FieldList<Self>) {
//!         list.field(|a| &a.id).field(|a| &a.region);
//!     }
//! }
//!
//! let a = ByFields(Account { id: 7, region: "eu".into(), last_seen: 1 });
//! let b = ByFields(Account { id: 7, region: "eu".into(), last_seen: 2 });
//! assert!(a == b);
//! ```

use crate::error::{Error, Result};
use core::any::{type_name, Any, TypeId};
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Types compared and hashed field by field.
pub trait Equatable: Sized + 'static {
    /// Push every field that takes part in equality, in comparison order.
    fn fields(list: &mut FieldList<Self>);
}

type EqFn<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;
type HashFn<T> = Box<dyn Fn(&T, &mut dyn Hasher) + Send + Sync>;

/// Field accessors collected by [`Equatable::fields`].
pub struct FieldList<T> {
    eq: Vec<EqFn<T>>,
    hash: Vec<HashFn<T>>,
}

impl<T: 'static> FieldList<T> {
    fn new() -> Self {
        Self {
            eq: Vec::new(),
            hash: Vec::new(),
        }
    }

    /// Opt a field in. `get` projects the field out of the value.
    pub fn field<F>(&mut self, get: fn(&T) -> &F) -> &mut Self
    where
        F: Eq + Hash + 'static,
    {
        self.eq.push(Box::new(move |a: &T, b: &T| get(a) == get(b)));
        self.hash.push(Box::new(move |value: &T, mut state: &mut dyn Hasher| {
            get(value).hash(&mut state)
        }));
        self
    }

    pub fn len(&self) -> usize {
        self.eq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_empty()
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::MisconfiguredType {
                type_name: type_name::<T>(),
            });
        }
        Ok(())
    }
}

type Compiled = Arc<dyn Any + Send + Sync>;

fn cache() -> &'static RwLock<HashMap<TypeId, Compiled>> {
    static CACHE: OnceLock<RwLock<HashMap<TypeId, Compiled>>> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}

/// Field list for `T`, built on first use.
fn field_list<T: Equatable>() -> Arc<FieldList<T>> {
    let id = TypeId::of::<T>();
    let found = cache().read().get(&id).cloned();
    let compiled = match found {
        Some(compiled) => compiled,
        None => {
            // Building outside the lock may race with another thread; the
            // first entry in wins and both lists are identical anyway.
            let mut list = FieldList::new();
            T::fields(&mut list);
            debug!(
                type_name = type_name::<T>(),
                fields = list.len(),
                "equatable: built field list"
            );
            let compiled: Compiled = Arc::new(list);
            cache().write().entry(id).or_insert(compiled).clone()
        }
    };
    compiled
        .downcast::<FieldList<T>>()
        .unwrap_or_else(|_| unreachable!("cache entry for {} has another type", type_name::<T>()))
}

/// Compare two values over their opted-in fields.
pub fn try_eq<T: Equatable>(a: &T, b: &T) -> Result<bool> {
    let list = field_list::<T>();
    list.ensure_configured()?;
    Ok(list.eq.iter().all(|eq| eq(a, b)))
}

/// Feed the opted-in fields of `value` into `state`, in field order.
pub fn try_hash<T: Equatable, H: Hasher>(value: &T, state: &mut H) -> Result<()> {
    let list = field_list::<T>();
    list.ensure_configured()?;
    let state: &mut dyn Hasher = state;
    for hash in &list.hash {
        hash(value, &mut *state);
    }
    Ok(())
}

/// Gives an [`Equatable`] type `PartialEq`, `Eq` and `Hash`.
///
/// # Panics
///
/// Comparing or hashing panics when `T` opts in no fields. Use [`try_eq`]
/// and [`try_hash`] to get the error instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByFields<T>(pub T);

impl<T> ByFields<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for ByFields<T> {
    fn from(value: T) -> Self {
        ByFields(value)
    }
}

impl<T> Deref for ByFields<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Equatable> PartialEq for ByFields<T> {
    fn eq(&self, other: &Self) -> bool {
        try_eq(&self.0, &other.0).unwrap_or_else(|e| panic!("{e}"))
    }
}

impl<T: Equatable> Eq for ByFields<T> {}

impl<T: Equatable> Hash for ByFields<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Err(e) = try_hash(&self.0, state) {
            panic!("{e}");
        }
    }
}
