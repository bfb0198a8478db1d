use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("invalid {kind} {name:?}: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("field {0:?} is reserved for record bookkeeping")]
    ReservedField(String),
}
