use std::fs;
use std::path::{Path, PathBuf};

use serialz_types::TypeTag;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::StoreResult;

/// Maps `(type tag, leaf name)` to `<root>/<type tag>/<leaf>`.
///
/// The root is made absolute once, at construction. Namespace directories
/// are created on demand and never removed.
#[derive(Clone, Debug)]
pub struct PathResolver {
    root: PathBuf,
    config: StoreConfig,
}

impl PathResolver {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let root = config.absolute_root()?;
        Ok(Self { root, config })
    }

    /// Default layout under `root`.
    pub fn at(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::new(StoreConfig::with_root(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The directory holding every record of `type_tag`. No I/O.
    pub fn namespace(&self, type_tag: &TypeTag) -> PathBuf {
        self.root.join(type_tag.as_str())
    }

    /// Create the namespace directory (and the root) if missing.
    pub fn ensure_namespace(&self, type_tag: &TypeTag) -> StoreResult<PathBuf> {
        let dir = self.namespace(type_tag);
        if !dir.is_dir() {
            fs::create_dir_all(&dir)?;
            debug!(dir = %dir.display(), "created namespace directory");
        }
        Ok(dir)
    }

    /// Resolve the destination for `leaf` inside the type's namespace,
    /// creating the namespace first.
    pub fn resolve(&self, type_tag: &TypeTag, leaf: &str) -> StoreResult<PathBuf> {
        Ok(self.ensure_namespace(type_tag)?.join(leaf))
    }
}
