//! Record persistence for serialz.
//!
//! A record is a named bag of attributes identified by a type tag and an id.
//! Records of each type live in their own namespace directory under a
//! configured root, so the same id can be reused freely across types.
//!
//! # Backends
//!
//! - [`TextRecord`]: one JSON document per record, `<root>/<type>/<id>.json`
//! - [`BinaryRecord`]: one object stream per record, `<root>/<type>/<id>.bin`
//! - [`KvRecord`]: one entry per record in a shared per-type store,
//!   `<root>/<type>/<type>_db`
//!
//! All three implement [`Record`]: open (optionally seeding, loading or
//! overwriting), then `save`, `load` and `delete`. Binary payloads are only
//! ever read through the restricted decoder in `serialz-codec`.

pub mod binary;
pub mod config;
pub mod error;
mod file;
pub mod guard;
pub mod kv;
pub mod path;
pub mod record;
pub mod text;

pub use binary::BinaryRecord;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use guard::{ensure_ready, Precondition};
pub use kv::KvRecord;
pub use path::PathResolver;
pub use record::{OpenOptions, Record, RecordState, RESERVED_TYPE_NAMES};
pub use text::TextRecord;
