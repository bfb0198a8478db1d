use std::fs;

use serialz_codec::{Decoded, ObjectCodec};
use serialz_types::{Attributes, RecordId, TypeTag};
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::file::write_atomic;
use crate::guard::Precondition;
use crate::path::PathResolver;
use crate::record::{OpenOptions, Record, RecordState};

/// A record stored as a binary object stream at `<root>/<type>/<id>.bin`.
///
/// Unlike [`TextRecord`](crate::TextRecord) this keeps byte strings, tuples,
/// sets and type descriptors intact. Loading always goes through the
/// restricted decoder: a stream naming any constructor outside the value
/// types is dropped with a warning and the attribute bag is left as is.
#[derive(Clone, Debug)]
pub struct BinaryRecord {
    state: RecordState,
}

impl BinaryRecord {
    fn write(&self) -> StoreResult<()> {
        let dest = self.state.ready(Precondition::Assigned)?;
        let bytes = ObjectCodec::encode(&self.state.payload())?;
        write_atomic(dest, &bytes)
    }
}

impl Record for BinaryRecord {
    fn open_with(
        resolver: &PathResolver,
        type_tag: TypeTag,
        id: RecordId,
        attributes: Attributes,
        options: OpenOptions,
    ) -> StoreResult<Self> {
        let mut state = RecordState::new(resolver, type_tag, id, attributes)?;
        let leaf = format!("{}.{}", state.id(), resolver.config().binary_extension);
        state.set_destination(&leaf)?;
        let mut record = Self { state };

        let exists = record.state.ready(Precondition::Assigned)?.is_file();
        if options.overwrite || !exists {
            record.write()?;
            info!(type_tag = %record.type_tag(), id = %record.id(), overwrite = options.overwrite, "binary record created");
            return Ok(record);
        }

        if options.autoload {
            record.load()?;
        }
        Ok(record)
    }

    fn state(&self) -> &RecordState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }

    fn save(&self) -> StoreResult<()> {
        self.state.ready(Precondition::Exists)?;
        self.write()
    }

    fn load(&mut self) -> StoreResult<()> {
        let dest = self.state.ready(Precondition::Exists)?;
        let bytes = fs::read(dest)?;
        match ObjectCodec::decode(&bytes)? {
            Decoded::Accepted(payload) => {
                self.state.merge_loaded(payload)?;
            }
            Decoded::Rejected(rejection) => {
                warn!(
                    type_tag = %self.type_tag(),
                    id = %self.id(),
                    %rejection,
                    "refusing stored payload; nothing merged"
                );
            }
        }
        Ok(())
    }

    fn delete(&self) -> StoreResult<()> {
        let dest = self.state.ready(Precondition::Exists)?;
        fs::remove_file(dest)?;
        debug!(dest = %dest.display(), "file removed");
        info!(type_tag = %self.type_tag(), id = %self.id(), "binary record deleted");
        Ok(())
    }
}
