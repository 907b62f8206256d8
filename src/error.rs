//! Crate error type.

use crate::key_index::InsertError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// A required key, or either element of a pair, was `None`.
    #[error("argument `{param}` must not be absent")]
    NullArgument { param: &'static str },

    /// `Map::add` where either side already holds a mapping.
    #[error("an element with the same key already exists")]
    DuplicateKey,

    /// Direct access through a `Map` side for a key it does not hold.
    #[error("the given key was not present")]
    KeyNotFound,

    /// Per-key count on an `IndexedSet` for a key it does not hold.
    #[error("the given key has no values in this index")]
    InvalidKey,

    /// Structural equality requested for a type that opts in no fields.
    #[error("type `{type_name}` has no fields marked for equality")]
    MisconfiguredType { type_name: &'static str },
}

impl From<InsertError> for Error {
    fn from(e: InsertError) -> Self {
        match e {
            InsertError::DuplicateKey => Error::DuplicateKey,
        }
    }
}

/// Unwrap a required argument or fail before anything is mutated.
#[inline]
pub(crate) fn required<T>(arg: Option<T>, param: &'static str) -> Result<T> {
    arg.ok_or(Error::NullArgument { param })
}
