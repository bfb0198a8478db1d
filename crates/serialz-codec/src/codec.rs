use bincode::Options;
use serialz_types::{TypeName, Value};

use crate::decoder::{Decoded, RestrictedDecoder};
use crate::error::{CodecError, CodecResult};
use crate::stream::{Global, ObjectStream, Op, MAX_STREAM_SIZE, STREAM_MAGIC, STREAM_VERSION};

fn options() -> impl Options {
    bincode::options().with_limit(MAX_STREAM_SIZE as u64)
}

/// Codec for the binary object stream.
pub struct ObjectCodec;

impl ObjectCodec {
    /// Encode a value as a framed object stream.
    pub fn encode(value: &Value) -> CodecResult<Vec<u8>> {
        let mut ops = Vec::new();
        emit(value, &mut ops);
        Self::write_stream(&ObjectStream::new(ops))
    }

    /// Decode through the default (all value types) restricted decoder.
    pub fn decode(data: &[u8]) -> CodecResult<Decoded> {
        Self::decode_with(&RestrictedDecoder::new(), data)
    }

    /// Decode through a specific restricted decoder.
    ///
    /// Returns `Err` only when the bytes are not a readable stream; a stream
    /// that references disallowed constructors is `Ok(Decoded::Rejected(_))`.
    pub fn decode_with(decoder: &RestrictedDecoder, data: &[u8]) -> CodecResult<Decoded> {
        let stream = Self::read_stream(data)?;
        Ok(decoder.decode(&stream.ops))
    }

    /// Serialize a raw stream without interpreting it.
    pub fn write_stream(stream: &ObjectStream) -> CodecResult<Vec<u8>> {
        options()
            .serialize(stream)
            .map_err(|e| CodecError::Serialization(e.to_string()))
    }

    /// Parse a raw stream and check its envelope.
    pub fn read_stream(data: &[u8]) -> CodecResult<ObjectStream> {
        if data.len() > MAX_STREAM_SIZE {
            return Err(CodecError::TooLarge {
                size: data.len(),
                max: MAX_STREAM_SIZE,
            });
        }
        let stream: ObjectStream = options()
            .deserialize(data)
            .map_err(|e| CodecError::Deserialization(e.to_string()))?;
        if stream.magic != STREAM_MAGIC {
            return Err(CodecError::BadMagic);
        }
        if stream.version != STREAM_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: stream.version,
                expected: STREAM_VERSION,
            });
        }
        Ok(stream)
    }
}

fn emit(value: &Value, ops: &mut Vec<Op>) {
    match value {
        Value::Bool(b) => ops.push(Op::Bool(*b)),
        Value::Int(i) => ops.push(Op::Int(*i)),
        Value::Float(x) => ops.push(Op::Float(*x)),
        Value::Text(s) => ops.push(Op::Str(s.clone())),
        Value::Bytes(b) => ops.push(Op::Bytes(b.clone())),
        Value::ByteArray(b) => {
            ops.push(Op::Global(Global::builtin(TypeName::ByteArray)));
            ops.push(Op::Bytes(b.clone()));
            ops.push(Op::Reduce(1));
        }
        Value::List(items) => emit_list(items.iter(), items.len(), ops),
        Value::Tuple(items) => {
            ops.push(Op::Global(Global::builtin(TypeName::Tuple)));
            emit_list(items.iter(), items.len(), ops);
            ops.push(Op::Reduce(1));
        }
        Value::Set(set) => {
            ops.push(Op::Global(Global::builtin(TypeName::Set)));
            emit_list(set.iter(), set.len(), ops);
            ops.push(Op::Reduce(1));
        }
        Value::Map(map) => {
            for (key, item) in map {
                ops.push(Op::Str(key.clone()));
                emit(item, ops);
            }
            ops.push(Op::Dict(map.len() as u32));
        }
        Value::Type(t) => ops.push(Op::Global(Global::builtin(*t))),
    }
}

fn emit_list<'a>(items: impl Iterator<Item = &'a Value>, len: usize, ops: &mut Vec<Op>) {
    for item in items {
        emit(item, ops);
    }
    ops.push(Op::List(len as u32));
}
