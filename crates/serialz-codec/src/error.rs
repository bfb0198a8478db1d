use serialz_types::TypeName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("not an object stream (bad magic)")]
    BadMagic,

    #[error("unsupported stream version: found {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("{kind} value cannot be represented as text: {reason}")]
    Unrepresentable { kind: TypeName, reason: String },

    #[error("unsupported JSON value: {0}")]
    UnsupportedJson(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
