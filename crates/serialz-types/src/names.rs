//! Type tags and record ids.
//!
//! Both name a location on disk (`<root>/<type tag>/<id>.<ext>`), so both are
//! restricted to a single, non-traversing path component:
//! - Must be non-empty
//! - Must not contain `/`, `\` or NUL
//! - Must not be `.` or `..`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Characters that are forbidden anywhere in a name.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '\0'];

fn validate_component(kind: &'static str, name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(TypeError::Empty { kind });
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(TypeError::InvalidName {
                kind,
                name: name.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }

    if name == "." || name == ".." {
        return Err(TypeError::InvalidName {
            kind,
            name: name.to_string(),
            reason: "must not be a relative path component".into(),
        });
    }

    Ok(())
}

/// The tag naming a record type; selects the storage namespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeTag(String);

impl TypeTag {
    /// Create a tag from an explicit name.
    ///
    /// ```
    /// use serialz_types::TypeTag;
    ///
    /// assert!(TypeTag::new("Score").is_ok());
    /// assert!(TypeTag::new("").is_err());
    /// assert!(TypeTag::new("../etc").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_component("type tag", &name)?;
        Ok(Self(name))
    }

    /// Derive a tag from a Rust type's name: the last path segment with any
    /// generic arguments stripped (`app::model::Score<u8>` becomes `Score`).
    pub fn of<T: ?Sized>() -> Result<Self, TypeError> {
        let full = std::any::type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        let short = base.rsplit("::").next().unwrap_or(base);
        Self::new(short)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TypeTag {
    type Error = TypeError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        tag.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

/// A record's identifier, unique within its type namespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_component("record id", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RecordId {
    type Error = TypeError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl TryFrom<&str> for RecordId {
    type Error = TypeError;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}
