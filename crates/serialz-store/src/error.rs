use std::path::PathBuf;

use serialz_codec::CodecError;
use serialz_types::{TypeError, TypeName};

/// Errors from record operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The type tag names one of the record abstractions themselves.
    #[error("{0} must be instanced through a concrete record type")]
    SubclassRequired(String),

    /// An operation ran before the backend resolved its destination.
    #[error("record destination is not set; the backend must resolve it from the id or type tag")]
    DestinationUnset,

    /// A guarded operation found no stored record.
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    /// A loaded payload was not a mapping.
    #[error("loaded data must be a mapping (found {found})")]
    TypeMismatch { found: TypeName },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key-value store error: {0}")]
    Kv(#[from] redb::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns `true` for the recoverable "nothing stored yet" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Convert any redb error into a [`StoreError`].
pub(crate) fn kv<E: Into<redb::Error>>(e: E) -> StoreError {
    StoreError::Kv(e.into())
}
