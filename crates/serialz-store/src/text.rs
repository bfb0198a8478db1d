use std::fs;

use serialz_codec::TextCodec;
use serialz_types::{Attributes, RecordId, TypeTag};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::file::write_atomic;
use crate::guard::Precondition;
use crate::path::PathResolver;
use crate::record::{OpenOptions, Record, RecordState};

/// A record stored as a JSON document at `<root>/<type>/<id>.json`.
#[derive(Clone, Debug)]
pub struct TextRecord {
    state: RecordState,
}

impl TextRecord {
    fn write(&self) -> StoreResult<()> {
        let dest = self.state.ready(Precondition::Assigned)?;
        let state = &self.state;
        let bytes = TextCodec::encode(
            state.id().as_str(),
            state.type_tag().as_str(),
            state.attributes(),
        )?;
        write_atomic(dest, &bytes)
    }
}

impl Record for TextRecord {
    fn open_with(
        resolver: &PathResolver,
        type_tag: TypeTag,
        id: RecordId,
        attributes: Attributes,
        options: OpenOptions,
    ) -> StoreResult<Self> {
        let mut state = RecordState::new(resolver, type_tag, id, attributes)?;
        let leaf = format!("{}.{}", state.id(), resolver.config().text_extension);
        state.set_destination(&leaf)?;
        let mut record = Self { state };

        let exists = record.state.ready(Precondition::Assigned)?.is_file();
        if options.overwrite || !exists {
            record.write()?;
            info!(type_tag = %record.type_tag(), id = %record.id(), overwrite = options.overwrite, "text record created");
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
        let payload = TextCodec::decode(&bytes)?;
        self.state.merge_loaded(payload)?;
        Ok(())
    }

    fn delete(&self) -> StoreResult<()> {
        let dest = self.state.ready(Precondition::Exists)?;
        fs::remove_file(dest)?;
        debug!(dest = %dest.display(), "file removed");
        info!(type_tag = %self.type_tag(), id = %self.id(), "text record deleted");
        Ok(())
    }
}
