//! Repair audit trail storage.

use anyhow::Result;

use crate::OwnerScopedTable;

crate::define_owner_table! {
    /// Serialized repair audit trails, one entry per `(owner_id, request_id)`.
    pub struct AuditTrailStorage { table: "repair_audit" }
}

impl AuditTrailStorage {
    pub fn put_trail(&self, owner_id: &str, request_id: &str, data: &[u8]) -> Result<()> {
        self.put_entry(owner_id, request_id, data)
    }

    pub fn get_trail(&self, owner_id: &str, request_id: &str) -> Result<Option<Vec<u8>>> {
        self.get_entry(owner_id, request_id)
    }

    /// All trails of one owner in request-id order.
    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Vec<u8>>> {
        self.list_entries(owner_id)
    }

    pub fn delete_trail(&self, owner_id: &str, request_id: &str) -> Result<bool> {
        self.delete_entry(owner_id, request_id)
    }
}
