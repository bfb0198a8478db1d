use std::collections::BTreeMap;

use crate::error::TypeError;
use crate::value::Value;

/// Field holding the record id in a persisted payload.
pub const ID_FIELD: &str = "id";

/// Field holding the type tag in a persisted payload.
pub const TYPE_FIELD: &str = "_type";

/// Fields owned by the record itself; never part of the attribute bag.
pub const RESERVED_FIELDS: [&str; 2] = [ID_FIELD, TYPE_FIELD];

/// Returns `true` if `name` is a bookkeeping field.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// A record's persisted payload: field name to value, ordered by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    fields: BTreeMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the previous value if any.
    ///
    /// Bookkeeping fields (`id`, `_type`) cannot be set.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, TypeError> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(TypeError::ReservedField(name));
        }
        Ok(self.fields.insert(name, value.into()))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Overlay `payload` onto this bag, skipping bookkeeping fields.
    /// Returns the number of fields written.
    pub fn overlay(&mut self, payload: BTreeMap<String, Value>) -> usize {
        let mut written = 0;
        for (name, value) in payload {
            if is_reserved(&name) {
                continue;
            }
            self.fields.insert(name, value);
            written += 1;
        }
        written
    }

    /// The bag as a map value with the bookkeeping fields prepended.
    pub fn to_payload(&self, id: &str, type_tag: &str) -> Value {
        let mut map = self.fields.clone();
        map.insert(ID_FIELD.to_string(), Value::from(id));
        map.insert(TYPE_FIELD.to_string(), Value::from(type_tag));
        Value::Map(map)
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut attrs = Attributes::new();
        assert_eq!(attrs.insert("score", 10).unwrap(), None);
        assert_eq!(attrs.insert("score", 11).unwrap(), Some(Value::Int(10)));
        assert_eq!(attrs.get("score"), Some(&Value::Int(11)));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn reserved_fields_refused() {
        let mut attrs = Attributes::new();
        assert_eq!(
            attrs.insert("id", "x").unwrap_err(),
            TypeError::ReservedField("id".into())
        );
        assert!(attrs.insert("_type", "x").is_err());
        assert!(attrs.is_empty());
    }

    #[test]
    fn overlay_skips_bookkeeping() {
        let mut attrs = Attributes::new();
        attrs.insert("keep", true).unwrap();
        attrs.insert("score", 1).unwrap();

        let mut payload = BTreeMap::new();
        payload.insert("id".to_string(), Value::from("other"));
        payload.insert("_type".to_string(), Value::from("Other"));
        payload.insert("score".to_string(), Value::from(5));

        assert_eq!(attrs.overlay(payload), 1);
        assert_eq!(attrs.get("score"), Some(&Value::Int(5)));
        assert_eq!(attrs.get("keep"), Some(&Value::Bool(true)));
        assert!(!attrs.contains("id"));
    }

    #[test]
    fn payload_includes_bookkeeping() {
        let mut attrs = Attributes::new();
        attrs.insert("score", 10).unwrap();
        let payload = attrs.to_payload("alice", "Score");
        let map = payload.as_map().unwrap();
        assert_eq!(map.get("id"), Some(&Value::from("alice")));
        assert_eq!(map.get("_type"), Some(&Value::from("Score")));
        assert_eq!(map.get("score"), Some(&Value::Int(10)));
    }
}
