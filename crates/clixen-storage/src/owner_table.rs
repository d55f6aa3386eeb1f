use anyhow::Result;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::sync::Arc;

use crate::keys::{owner_prefix, record_key};

/// Byte-valued table whose rows are keyed by `(owner_id, request_id)`.
///
/// Implementors supply the table and the database; every operation is
/// confined to one owner's key range.
pub trait OwnerScopedTable: Send + Sync {
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]>;

    fn db(&self) -> &Arc<Database>;

    fn put_entry(&self, owner_id: &str, request_id: &str, data: &[u8]) -> Result<()> {
        let key = record_key(owner_id, request_id);
        let write_txn = self.db().begin_write()?;
        {
            let mut table = write_txn.open_table(Self::TABLE)?;
            table.insert(key.as_str(), data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_entry(&self, owner_id: &str, request_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(Self::TABLE)?;
        let key = record_key(owner_id, request_id);
        Ok(table.get(key.as_str())?.map(|value| value.value().to_vec()))
    }

    /// Entries of one owner in request-id order.
    fn list_entries(&self, owner_id: &str) -> Result<Vec<Vec<u8>>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(Self::TABLE)?;
        let prefix = owner_prefix(owner_id);

        let mut entries = Vec::new();
        for item in table.range(prefix.as_str()..)? {
            let (key, value) = item?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            entries.push(value.value().to_vec());
        }
        Ok(entries)
    }

    fn delete_entry(&self, owner_id: &str, request_id: &str) -> Result<bool> {
        let key = record_key(owner_id, request_id);
        let write_txn = self.db().begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(Self::TABLE)?;
            table.remove(key.as_str())?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }
}

/// Declare a struct backed by its own owner-scoped table.
#[macro_export]
macro_rules! define_owner_table {
    ( $(#[$meta:meta])* $vis:vis struct $name:ident { table: $table_name:literal } ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            db: std::sync::Arc<redb::Database>,
        }

        impl $name {
            pub fn new(db: std::sync::Arc<redb::Database>) -> anyhow::Result<Self> {
                let write_txn = db.begin_write()?;
                write_txn.open_table(<Self as $crate::OwnerScopedTable>::TABLE)?;
                write_txn.commit()?;
                Ok(Self { db })
            }
        }

        impl $crate::OwnerScopedTable for $name {
            const TABLE: redb::TableDefinition<'static, &'static str, &'static [u8]> =
                redb::TableDefinition::new($table_name);

            fn db(&self) -> &std::sync::Arc<redb::Database> {
                &self.db
            }
        }
    };
}
