//! JSON document encoding for the text backend.
//!
//! A record is written as one compact JSON object with the bookkeeping
//! fields first, followed by its attributes in name order:
//!
//! ```text
//! {"id":"alice","_type":"Score","score":10}
//! ```
//!
//! JSON has no byte strings, sets, or type descriptors, so those values are
//! refused on encode. Tuples are written as arrays and read back as lists.

use serde::Serialize;
use serde_json::{Map, Number};
use serialz_types::{Attributes, Value};

use crate::error::{CodecError, CodecResult};

#[derive(Serialize)]
struct Document<'a> {
    id: &'a str,
    #[serde(rename = "_type")]
    type_tag: &'a str,
    #[serde(flatten)]
    fields: Map<String, serde_json::Value>,
}

/// Codec for JSON record documents.
pub struct TextCodec;

impl TextCodec {
    /// Encode a record's bookkeeping and attributes as a JSON document.
    pub fn encode(id: &str, type_tag: &str, attributes: &Attributes) -> CodecResult<Vec<u8>> {
        let mut fields = Map::new();
        for (name, value) in attributes {
            fields.insert(name.clone(), to_json(value)?);
        }
        let doc = Document {
            id,
            type_tag,
            fields,
        };
        serde_json::to_vec(&doc).map_err(|e| CodecError::Serialization(e.to_string()))
    }

    /// Decode a JSON document into a value. The document need not be an
    /// object; callers decide what a non-mapping payload means.
    pub fn decode(data: &[u8]) -> CodecResult<Value> {
        let json: serde_json::Value =
            serde_json::from_slice(data).map_err(|e| CodecError::Deserialization(e.to_string()))?;
        from_json(json)
    }
}

/// Convert a value to its JSON form.
pub fn to_json(value: &Value) -> CodecResult<serde_json::Value> {
    Ok(match value {
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number(Number::from(*i)),
        Value::Float(x) => {
            let n = Number::from_f64(*x).ok_or_else(|| CodecError::Unrepresentable {
                kind: value.kind(),
                reason: format!("{x} is not finite"),
            })?;
            serde_json::Value::Number(n)
        }
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::List(items) | Value::Tuple(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<CodecResult<_>>()?)
        }
        Value::Map(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), to_json(v)?);
            }
            serde_json::Value::Object(out)
        }
        Value::Bytes(_) | Value::ByteArray(_) | Value::Set(_) | Value::Type(_) => {
            return Err(CodecError::Unrepresentable {
                kind: value.kind(),
                reason: "no JSON equivalent".into(),
            })
        }
    })
}

/// Convert a JSON value into a value.
pub fn from_json(json: serde_json::Value) -> CodecResult<Value> {
    Ok(match json {
        serde_json::Value::Null => return Err(CodecError::UnsupportedJson("null".into())),
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or_else(|| {
                CodecError::UnsupportedJson(format!("number {n} out of range"))
            })?),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => {
            Value::List(items.into_iter().map(from_json).collect::<CodecResult<_>>()?)
        }
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| -> CodecResult<(String, Value)> { Ok((k, from_json(v)?)) })
                .collect::<CodecResult<_>>()?,
        ),
    })
}
