use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// What an operation requires of its destination before any I/O.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// A destination has been assigned.
    Assigned,
    /// A destination has been assigned and exists on disk.
    Exists,
}

/// Check `destination` against `precondition`, returning the path to
/// operate on.
///
/// An unassigned destination is a [`StoreError::DestinationUnset`] whatever
/// the precondition; a missing one under [`Precondition::Exists`] is a
/// [`StoreError::NotFound`].
pub fn ensure_ready(destination: Option<&Path>, precondition: Precondition) -> StoreResult<&Path> {
    let path = match destination {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => return Err(StoreError::DestinationUnset),
    };
    if precondition == Precondition::Exists && !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    Ok(path)
}
