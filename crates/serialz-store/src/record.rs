use std::path::Path;

use serialz_types::{Attributes, RecordId, TypeTag, Value};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::guard::{ensure_ready, Precondition};
use crate::path::PathResolver;

/// Names of the record abstractions. A type tag may never be one of these:
/// records are always opened as some concrete, caller-named type.
pub const RESERVED_TYPE_NAMES: [&str; 4] = ["Record", "TextRecord", "BinaryRecord", "KvRecord"];

/// Construction options shared by every backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenOptions {
    /// Merge stored data into the new record when it already exists.
    pub autoload: bool,
    /// Write the new record immediately, replacing stored data.
    pub overwrite: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            autoload: true,
            overwrite: false,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn autoload(mut self, autoload: bool) -> Self {
        self.autoload = autoload;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// State every record embeds: identity, payload, and resolved destination.
#[derive(Clone, Debug)]
pub struct RecordState {
    id: RecordId,
    type_tag: TypeTag,
    attributes: Attributes,
    destination: Option<std::path::PathBuf>,
    resolver: PathResolver,
}

impl RecordState {
    /// Validate the type tag and prepare its namespace directory.
    ///
    /// The destination starts unset; the backend assigns it with
    /// [`RecordState::set_destination`].
    pub fn new(
        resolver: &PathResolver,
        type_tag: TypeTag,
        id: RecordId,
        attributes: Attributes,
    ) -> StoreResult<Self> {
        if RESERVED_TYPE_NAMES.contains(&type_tag.as_str()) {
            return Err(StoreError::SubclassRequired(type_tag.to_string()));
        }
        resolver.ensure_namespace(&type_tag)?;
        Ok(Self {
            id,
            type_tag,
            attributes,
            destination: None,
            resolver: resolver.clone(),
        })
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Point the record at `leaf` inside its type namespace.
    pub fn set_destination(&mut self, leaf: &str) -> StoreResult<()> {
        let path = self.resolver.resolve(&self.type_tag, leaf)?;
        debug!(type_tag = %self.type_tag, id = %self.id, dest = %path.display(), "destination resolved");
        self.destination = Some(path);
        Ok(())
    }

    /// Run the guard for an operation.
    pub fn ready(&self, precondition: Precondition) -> StoreResult<&Path> {
        ensure_ready(self.destination(), precondition)
    }

    /// Overlay a decoded payload onto the attribute bag.
    ///
    /// Only mappings can be merged; anything else is a
    /// [`StoreError::TypeMismatch`] and leaves the bag untouched.
    /// Bookkeeping fields in the payload are ignored.
    pub fn merge(&mut self, payload: Value) -> StoreResult<usize> {
        match payload {
            Value::Map(map) => Ok(self.attributes.overlay(map)),
            other => Err(StoreError::TypeMismatch {
                found: other.kind(),
            }),
        }
    }

    /// Merge `payload` unless it is falsy, which means "nothing to merge".
    /// Returns whether anything was merged.
    pub fn merge_loaded(&mut self, payload: Value) -> StoreResult<bool> {
        if !payload.is_truthy() {
            debug!(type_tag = %self.type_tag, id = %self.id, "empty payload; nothing to merge");
            return Ok(false);
        }
        let written = self.merge(payload)?;
        debug!(type_tag = %self.type_tag, id = %self.id, fields = written, "payload merged");
        Ok(true)
    }

    /// The full persisted form: attributes plus bookkeeping fields.
    pub fn payload(&self) -> Value {
        self.attributes
            .to_payload(self.id.as_str(), self.type_tag.as_str())
    }
}

/// The save/load/delete contract every backend implements.
pub trait Record: Sized {
    /// Open a record, seeding its attribute bag with `attributes`.
    ///
    /// If nothing is stored yet, or `options.overwrite` is set, the seeded
    /// bag is written immediately and nothing is loaded. Otherwise the
    /// stored payload is merged over the seed when `options.autoload` is set.
    fn open_with(
        resolver: &PathResolver,
        type_tag: TypeTag,
        id: RecordId,
        attributes: Attributes,
        options: OpenOptions,
    ) -> StoreResult<Self>;

    /// Open a record with an empty seed.
    fn open(
        resolver: &PathResolver,
        type_tag: TypeTag,
        id: RecordId,
        options: OpenOptions,
    ) -> StoreResult<Self> {
        Self::open_with(resolver, type_tag, id, Attributes::new(), options)
    }

    fn state(&self) -> &RecordState;

    fn state_mut(&mut self) -> &mut RecordState;

    /// Persist the attribute bag, replacing what is stored.
    fn save(&self) -> StoreResult<()>;

    /// Merge the stored payload into the attribute bag.
    fn load(&mut self) -> StoreResult<()>;

    /// Remove the stored payload.
    fn delete(&self) -> StoreResult<()>;

    fn id(&self) -> &RecordId {
        self.state().id()
    }

    fn type_tag(&self) -> &TypeTag {
        self.state().type_tag()
    }

    fn destination(&self) -> Option<&Path> {
        self.state().destination()
    }

    fn attributes(&self) -> &Attributes {
        self.state().attributes()
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.state().attributes().get(name)
    }

    /// Set an attribute in memory. Nothing is persisted until [`Record::save`].
    fn set(&mut self, name: &str, value: impl Into<Value>) -> StoreResult<Option<Value>> {
        Ok(self.state_mut().attributes_mut().insert(name, value)?)
    }

    fn merge(&mut self, payload: Value) -> StoreResult<usize> {
        self.state_mut().merge(payload)
    }
}
