use std::fmt;

use serde::{Deserialize, Serialize};
use serialz_types::TypeName;

pub const STREAM_MAGIC: [u8; 4] = *b"SZOB";
pub const STREAM_VERSION: u32 = 1;
pub const MAX_STREAM_SIZE: usize = 64 * 1024 * 1024;

/// Deepest container nesting the decoder will rebuild.
pub const MAX_DEPTH: usize = 128;

/// Module under which the value constructors live.
pub const BUILTINS: &str = "builtins";

/// A by-name reference to a constructor, as written in a stream.
///
/// Nothing guarantees the reference names anything real: resolving it is
/// the decoder's job, and it only resolves allow-listed names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Global {
    pub module: String,
    pub name: String,
}

impl Global {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Reference to one of the value constructors.
    pub fn builtin(name: TypeName) -> Self {
        Self::new(BUILTINS, name.as_str())
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// One instruction of the object stream.
///
/// The stream is a postfix program over a value stack: literals push,
/// `List`/`Dict` collect, `Global` pushes a constructor reference and
/// `Reduce` applies the constructor below its arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Pop `n` entries into a list.
    List(u32),
    /// Pop `2n` entries as key/value pairs into a mapping.
    Dict(u32),
    /// Push a constructor reference.
    Global(Global),
    /// Pop `argc` arguments and a constructor; push the constructed value.
    Reduce(u32),
}

/// The on-disk envelope of a binary payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectStream {
    pub magic: [u8; 4],
    pub version: u32,
    pub ops: Vec<Op>,
}

impl ObjectStream {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            magic: STREAM_MAGIC,
            version: STREAM_VERSION,
            ops,
        }
    }
}
