//! Payload encodings for serialz.
//!
//! Two encodings are provided:
//!
//! - [`TextCodec`]: compact JSON documents for the text backend
//! - [`ObjectCodec`]: a binary object stream for the binary and key-value
//!   backends, able to carry byte strings, tuples, sets and type descriptors
//!
//! An object stream is a small postfix program ([`Op`]s) that rebuilds a
//! value by applying named constructors. Reading one is only ever done
//! through the [`RestrictedDecoder`], which resolves constructor names
//! against an allow-list of value types and refuses the stream outright if
//! it names anything else.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod stream;
pub mod text;

pub use codec::ObjectCodec;
pub use decoder::{Decoded, Rejection, RestrictedDecoder};
pub use error::{CodecError, CodecResult};
pub use stream::{
    Global, ObjectStream, Op, BUILTINS, MAX_DEPTH, MAX_STREAM_SIZE, STREAM_MAGIC, STREAM_VERSION,
};
pub use text::TextCodec;
