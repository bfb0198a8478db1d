use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::StoreResult;

/// Replace `dest` with `bytes` atomically: write a sibling temp file, sync
/// it, then rename it over the destination.
pub(crate) fn write_atomic(dest: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    debug!(dest = %dest.display(), len = bytes.len(), "record written");
    Ok(())
}
