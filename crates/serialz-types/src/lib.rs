//! Foundation types for serialz.
//!
//! This crate provides the value model shared by every storage backend.
//! Every other serialz crate depends on `serialz-types`.
//!
//! # Key Types
//!
//! - [`Value`]: Tagged value variant (scalars, byte sequences, containers, type descriptors)
//! - [`TypeName`]: The closed set of constructors a [`Value`] can come from
//! - [`Attributes`]: A record's persisted payload, ordered by field name
//! - [`TypeTag`]: Names a record type and its storage namespace
//! - [`RecordId`]: Identifies one record within its type namespace

pub mod attributes;
pub mod error;
pub mod names;
pub mod value;

pub use attributes::{is_reserved, Attributes, ID_FIELD, RESERVED_FIELDS, TYPE_FIELD};
pub use error::TypeError;
pub use names::{RecordId, TypeTag};
pub use value::{TypeName, Value, ValueSet};
