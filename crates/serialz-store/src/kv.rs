use std::path::Path;

use redb::{ReadableDatabase, TableDefinition};
use serialz_codec::{Decoded, ObjectCodec};
use serialz_types::{Attributes, RecordId, TypeTag};
use tracing::{debug, info, warn};

use crate::error::{kv, StoreResult};
use crate::guard::Precondition;
use crate::path::PathResolver;
use crate::record::{OpenOptions, Record, RecordState};

/// Key: record id, Value: object stream bytes.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

fn open_store(path: &Path) -> StoreResult<redb::Database> {
    redb::Database::create(path).map_err(kv)
}

fn read_entry(path: &Path, key: &str) -> StoreResult<Option<Vec<u8>>> {
    let db = open_store(path)?;
    let txn = db.begin_read().map_err(kv)?;
    let table = match txn.open_table(RECORDS) {
        Ok(table) => table,
        Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(kv(e)),
    };
    Ok(table.get(key).map_err(kv)?.map(|guard| guard.value().to_vec()))
}

fn write_entry(path: &Path, key: &str, bytes: &[u8]) -> StoreResult<()> {
    let db = open_store(path)?;
    let txn = db.begin_write().map_err(kv)?;
    {
        let mut table = txn.open_table(RECORDS).map_err(kv)?;
        table.insert(key, bytes).map_err(kv)?;
    }
    txn.commit().map_err(kv)?;
    debug!(store = %path.display(), key, len = bytes.len(), "entry written");
    Ok(())
}

fn remove_entry(path: &Path, key: &str) -> StoreResult<bool> {
    let db = open_store(path)?;
    let txn = db.begin_write().map_err(kv)?;
    let mut table = txn.open_table(RECORDS).map_err(kv)?;
    let removed = table.remove(key).map_err(kv)?.is_some();
    drop(table);
    txn.commit().map_err(kv)?;
    Ok(removed)
}

/// A record stored as one entry of a per-type store file at
/// `<root>/<type>/<type>_db`, keyed by id.
///
/// Every record of a type shares the store file, so deleting one id leaves
/// the others in place. The store is opened for each operation and closed
/// when it completes. Deleting an id that was never saved is a no-op, as is
/// loading one.
#[derive(Clone, Debug)]
pub struct KvRecord {
    state: RecordState,
}

impl KvRecord {
    fn store(&self) -> StoreResult<&Path> {
        self.state.ready(Precondition::Assigned)
    }

    fn write(&self) -> StoreResult<()> {
        let store = self.store()?;
        let bytes = ObjectCodec::encode(&self.state.payload())?;
        write_entry(store, self.state.id().as_str(), &bytes)
    }
}

impl Record for KvRecord {
    fn open_with(
        resolver: &PathResolver,
        type_tag: TypeTag,
        id: RecordId,
        attributes: Attributes,
        options: OpenOptions,
    ) -> StoreResult<Self> {
        let mut state = RecordState::new(resolver, type_tag, id, attributes)?;
        let leaf = format!("{}_db", state.type_tag());
        state.set_destination(&leaf)?;
        let mut record = Self { state };

        let stored = read_entry(record.store()?, record.id().as_str())?;
        match stored {
            Some(bytes) if !options.overwrite => {
                if options.autoload {
                    record.merge_stored(&bytes)?;
                }
            }
            _ => {
                record.write()?;
                info!(type_tag = %record.type_tag(), id = %record.id(), overwrite = options.overwrite, "kv record created");
            }
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
        self.write()
    }

    fn load(&mut self) -> StoreResult<()> {
        match read_entry(self.store()?, self.id().as_str())? {
            Some(bytes) => self.merge_stored(&bytes),
            None => {
                debug!(type_tag = %self.type_tag(), id = %self.id(), "no entry; nothing to load");
                Ok(())
            }
        }
    }

    fn delete(&self) -> StoreResult<()> {
        let removed = remove_entry(self.store()?, self.id().as_str())?;
        if removed {
            info!(type_tag = %self.type_tag(), id = %self.id(), "kv record deleted");
        } else {
            debug!(type_tag = %self.type_tag(), id = %self.id(), "no entry; nothing to delete");
        }
        Ok(())
    }
}

impl KvRecord {
    fn merge_stored(&mut self, bytes: &[u8]) -> StoreResult<()> {
        match ObjectCodec::decode(bytes)? {
            Decoded::Accepted(payload) => {
                self.state.merge_loaded(payload)?;
            }
            Decoded::Rejected(rejection) => {
                warn!(
                    type_tag = %self.type_tag(),
                    id = %self.id(),
                    %rejection,
                    "refusing stored entry; nothing merged"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serialz_codec::{Global, ObjectStream, Op};
    use serialz_types::{TypeName, Value};

    use super::*;

    fn setup() -> (tempfile::TempDir, PathResolver) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::at(dir.path().join("data")).unwrap();
        (dir, resolver)
    }

    fn tag(name: &str) -> TypeTag {
        TypeTag::new(name).unwrap()
    }

    fn id(name: &str) -> RecordId {
        RecordId::new(name).unwrap()
    }

    #[test]
    fn ids_share_one_store_file() {
        let (dir, resolver) = setup();
        let mut a = KvRecord::open(&resolver, tag("Cache"), id("a"), OpenOptions::new()).unwrap();
        let mut b = KvRecord::open(&resolver, tag("Cache"), id("b"), OpenOptions::new()).unwrap();

        let store = dir.path().join("data").join("Cache").join("Cache_db");
        assert_eq!(a.destination().unwrap(), store);
        assert_eq!(b.destination().unwrap(), store);

        a.set("v", 1).unwrap();
        b.set("v", 2).unwrap();
        a.save().unwrap();
        b.save().unwrap();

        a.delete().unwrap();
        assert!(store.is_file());

        let b = KvRecord::open(&resolver, tag("Cache"), id("b"), OpenOptions::new()).unwrap();
        assert_eq!(b.get("v"), Some(&Value::Int(2)));

        // "a" is gone, so reopening writes a fresh empty entry.
        let a = KvRecord::open(&resolver, tag("Cache"), id("a"), OpenOptions::new()).unwrap();
        assert!(a.get("v").is_none());
    }

    #[test]
    fn deleting_unsaved_id_is_noop() {
        let (_dir, resolver) = setup();
        let record = KvRecord::open(&resolver, tag("Cache"), id("x"), OpenOptions::new()).unwrap();
        record.delete().unwrap();
        record.delete().unwrap();
    }

    #[test]
    fn load_of_missing_entry_is_noop() {
        let (_dir, resolver) = setup();
        let mut record = KvRecord::open(&resolver, tag("Cache"), id("y"), OpenOptions::new()).unwrap();
        record.set("v", 9).unwrap();
        record.delete().unwrap();
        record.load().unwrap();
        assert_eq!(record.get("v"), Some(&Value::Int(9)));
    }

    #[test]
    fn save_then_reopen_round_trips() {
        let (_dir, resolver) = setup();
        let mut record = KvRecord::open(&resolver, tag("Cache"), id("r"), OpenOptions::new()).unwrap();
        record.set("blob", Value::Bytes(vec![0, 255])).unwrap();
        record.set("pair", Value::Tuple(vec![Value::from("x"), Value::Bool(false)])).unwrap();
        record.set("kind", Value::Type(TypeName::Dict)).unwrap();
        record.save().unwrap();

        let reopened = KvRecord::open(&resolver, tag("Cache"), id("r"), OpenOptions::new()).unwrap();
        assert_eq!(reopened.attributes(), record.attributes());
    }

    #[test]
    fn save_writes_even_without_prior_entry() {
        let (_dir, resolver) = setup();
        let mut record = KvRecord::open(&resolver, tag("Cache"), id("s"), OpenOptions::new()).unwrap();
        record.delete().unwrap();
        record.set("v", 3).unwrap();
        record.save().unwrap();

        let reopened = KvRecord::open(&resolver, tag("Cache"), id("s"), OpenOptions::new()).unwrap();
        assert_eq!(reopened.get("v"), Some(&Value::Int(3)));
    }

    #[test]
    fn autoload_off_skips_load() {
        let (_dir, resolver) = setup();
        let mut record = KvRecord::open(&resolver, tag("Cache"), id("lazy"), OpenOptions::new()).unwrap();
        record.set("v", 5).unwrap();
        record.save().unwrap();

        let mut lazy = KvRecord::open(&resolver, tag("Cache"), id("lazy"), OpenOptions::new().autoload(false)).unwrap();
        assert!(lazy.get("v").is_none());
        lazy.load().unwrap();
        assert_eq!(lazy.get("v"), Some(&Value::Int(5)));
    }

    #[test]
    fn overwrite_replaces_entry() {
        let (_dir, resolver) = setup();
        let mut record = KvRecord::open(&resolver, tag("Cache"), id("o"), OpenOptions::new()).unwrap();
        record.set("v", 1).unwrap();
        record.save().unwrap();

        let fresh = KvRecord::open(&resolver, tag("Cache"), id("o"), OpenOptions::new().overwrite(true)).unwrap();
        assert!(fresh.attributes().is_empty());

        let reopened = KvRecord::open(&resolver, tag("Cache"), id("o"), OpenOptions::new()).unwrap();
        assert!(reopened.get("v").is_none());
    }

    #[test]
    fn types_do_not_collide() {
        let (_dir, resolver) = setup();
        let mut a = KvRecord::open(&resolver, tag("TypeA"), id("42"), OpenOptions::new()).unwrap();
        let mut b = KvRecord::open(&resolver, tag("TypeB"), id("42"), OpenOptions::new()).unwrap();
        assert_ne!(a.destination(), b.destination());
        a.set("owner", "a").unwrap();
        b.set("owner", "b").unwrap();
        a.save().unwrap();
        b.save().unwrap();
        a.delete().unwrap();

        let b = KvRecord::open(&resolver, tag("TypeB"), id("42"), OpenOptions::new()).unwrap();
        assert_eq!(b.get("owner"), Some(&Value::from("b")));
    }

    #[test]
    fn disallowed_constructor_in_entry_is_refused() {
        let (dir, resolver) = setup();
        let mut record = KvRecord::open(&resolver, tag("Cache"), id("evil"), OpenOptions::new()).unwrap();
        record.set("v", 1).unwrap();

        let crafted = ObjectStream::new(vec![
            Op::Global(Global::new("subprocess", "Popen")),
            Op::Str("id".into()),
            Op::Reduce(1),
        ]);
        let bytes = ObjectCodec::write_stream(&crafted).unwrap();
        let store = dir.path().join("data").join("Cache").join("Cache_db");
        write_entry(&store, "evil", &bytes).unwrap();

        record.load().unwrap();
        assert_eq!(record.get("v"), Some(&Value::Int(1)));
    }
}
