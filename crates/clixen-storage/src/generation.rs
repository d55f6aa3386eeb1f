//! Generation record storage - byte-level API keyed by `(owner_id, request_id)`.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

use crate::keys::{index_key, owner_prefix, record_key};

const GENERATION_DATA: TableDefinition<&str, &[u8]> = TableDefinition::new("generation:data");
const GENERATION_INDEX: TableDefinition<&str, &str> = TableDefinition::new("generation:index");

/// Low-level generation record storage.
///
/// Records live in `generation:data` under `owner:request`. The
/// `generation:index` table maps `owner:reverse_ts:request` to the record key
/// so that per-owner listings come back newest first.
pub struct GenerationStorage {
    db: Arc<Database>,
}

impl GenerationStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(GENERATION_DATA)?;
        write_txn.open_table(GENERATION_INDEX)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert or overwrite a record. `created_at_ms` must be stable across
    /// updates of the same request or the index gains a second entry.
    pub fn put_raw(
        &self,
        owner_id: &str,
        request_id: &str,
        created_at_ms: i64,
        data: &[u8],
    ) -> Result<()> {
        let key = record_key(owner_id, request_id);
        let write_txn = self.db.begin_write()?;
        {
            let mut data_table = write_txn.open_table(GENERATION_DATA)?;
            data_table.insert(key.as_str(), data)?;
            drop(data_table);

            let mut index_table = write_txn.open_table(GENERATION_INDEX)?;
            let index = index_key(owner_id, created_at_ms, request_id);
            index_table.insert(index.as_str(), key.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a record by owner and request id.
    pub fn get_raw(&self, owner_id: &str, request_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(GENERATION_DATA)?;
        let key = record_key(owner_id, request_id);

        if let Some(value) = table.get(key.as_str())? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// List all records of one owner, newest first.
    pub fn list_raw_by_owner(&self, owner_id: &str) -> Result<Vec<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(GENERATION_INDEX)?;
        let data = read_txn.open_table(GENERATION_DATA)?;
        let prefix = owner_prefix(owner_id);

        let mut records = Vec::new();
        for item in index.range(prefix.as_str()..)? {
            let (key, value) = item?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            if let Some(bytes) = data.get(value.value())? {
                records.push(bytes.value().to_vec());
            }
        }

        Ok(records)
    }

    /// Delete a record and its index entry, returns true if it existed.
    pub fn delete(&self, owner_id: &str, request_id: &str) -> Result<bool> {
        let key = record_key(owner_id, request_id);
        let prefix = owner_prefix(owner_id);
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut data_table = write_txn.open_table(GENERATION_DATA)?;
            let existed = data_table.remove(key.as_str())?.is_some();
            drop(data_table);

            let mut index_table = write_txn.open_table(GENERATION_INDEX)?;
            let mut stale = Vec::new();
            for item in index_table.range(prefix.as_str()..)? {
                let (index, value) = item?;
                if !index.value().starts_with(&prefix) {
                    break;
                }
                if value.value() == key {
                    stale.push(index.value().to_string());
                }
            }
            for index in stale {
                index_table.remove(index.as_str())?;
            }
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Returns both the store and the TempDir to ensure the directory
    /// is not deleted while the store is in use.
    fn test_store() -> (GenerationStorage, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("generations.redb");
        let db = Arc::new(Database::create(db_path).unwrap());
        (GenerationStorage::new(db).unwrap(), dir)
    }

    #[test]
    fn test_put_and_get_raw() {
        let (store, _dir) = test_store();
        store.put_raw("u1", "req-1", 1_000, b"record").unwrap();

        let retrieved = store.get_raw("u1", "req-1").unwrap();
        assert_eq!(retrieved.as_deref(), Some(&b"record"[..]));
        assert!(store.get_raw("u2", "req-1").unwrap().is_none());
    }

    #[test]
    fn test_list_by_owner_is_isolated_and_newest_first() {
        let (store, _dir) = test_store();
        store.put_raw("u1", "req-1", 1_000, b"old").unwrap();
        store.put_raw("u1", "req-2", 2_000, b"new").unwrap();
        store.put_raw("u2", "req-3", 3_000, b"other").unwrap();

        let records = store.list_raw_by_owner("u1").unwrap();
        assert_eq!(records, vec![b"new".to_vec(), b"old".to_vec()]);
        assert_eq!(store.list_raw_by_owner("u2").unwrap().len(), 1);
        assert!(store.list_raw_by_owner("u3").unwrap().is_empty());
    }

    #[test]
    fn test_overwrite_keeps_single_index_entry() {
        let (store, _dir) = test_store();
        store.put_raw("u1", "req-1", 1_000, b"draft").unwrap();
        store.put_raw("u1", "req-1", 1_000, b"deployed").unwrap();

        let records = store.list_raw_by_owner("u1").unwrap();
        assert_eq!(records, vec![b"deployed".to_vec()]);
    }

    #[test]
    fn test_delete() {
        let (store, _dir) = test_store();
        store.put_raw("u1", "req-1", 1_000, b"data").unwrap();

        assert!(store.delete("u1", "req-1").unwrap());
        assert!(!store.delete("u1", "req-1").unwrap());
        assert!(store.get_raw("u1", "req-1").unwrap().is_none());
        assert!(store.list_raw_by_owner("u1").unwrap().is_empty());
    }
}
