//! Typed access to generation records and repair audit trails.
//!
//! Wraps the byte-level tables of `clixen-storage` with the core models.

use std::sync::Arc;

use anyhow::{Context, Result};
use redb::Database;

use crate::models::{GenerationRecord, RepairAttempt};

pub struct GenerationStore {
    inner: clixen_storage::Storage,
}

impl GenerationStore {
    pub fn open(path: &str) -> Result<Self> {
        let inner = clixen_storage::Storage::new(path)
            .with_context(|| format!("Failed to open generation store at {path}"))?;
        Ok(Self { inner })
    }

    /// Persist a record together with its audit trail. Saving the same
    /// request again overwrites both.
    pub fn save(&self, record: &GenerationRecord, trail: &[RepairAttempt]) -> Result<()> {
        let data = serde_json::to_vec(record).context("Failed to serialize generation record")?;
        self.inner.generations.put_raw(
            &record.owner_id,
            &record.request_id,
            record.created_at,
            &data,
        )?;

        let trail = serde_json::to_vec(trail).context("Failed to serialize repair audit trail")?;
        self.inner
            .audit_trails
            .put_trail(&record.owner_id, &record.request_id, &trail)?;
        Ok(())
    }

    pub fn get(&self, owner_id: &str, request_id: &str) -> Result<Option<GenerationRecord>> {
        self.inner
            .generations
            .get_raw(owner_id, request_id)?
            .map(|data| {
                serde_json::from_slice(&data).context("Failed to deserialize generation record")
            })
            .transpose()
    }

    pub fn audit_trail(&self, owner_id: &str, request_id: &str) -> Result<Vec<RepairAttempt>> {
        match self.inner.audit_trails.get_trail(owner_id, request_id)? {
            Some(data) => {
                serde_json::from_slice(&data).context("Failed to deserialize repair audit trail")
            }
            None => Ok(Vec::new()),
        }
    }

    /// Records of one owner, newest first.
    pub fn list(&self, owner_id: &str, limit: Option<usize>) -> Result<Vec<GenerationRecord>> {
        let raw = self.inner.generations.list_raw_by_owner(owner_id)?;
        raw.iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|data| {
                serde_json::from_slice(data).context("Failed to deserialize generation record")
            })
            .collect()
    }

    pub fn delete(&self, owner_id: &str, request_id: &str) -> Result<bool> {
        let removed = self.inner.generations.delete(owner_id, request_id)?;
        self.inner.audit_trails.delete_trail(owner_id, request_id)?;
        Ok(removed)
    }

    pub fn get_db(&self) -> Arc<Database> {
        self.inner.get_db()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationRequest, GenerationState, Transformation, TransformationKind};
    use tempfile::tempdir;

    #[test]
    fn test_save_get_list_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clixen.db");
        let store = GenerationStore::open(path.to_str().unwrap()).unwrap();

        let mut older = GenerationRecord::new(&GenerationRequest::new("u1", "A", "first"));
        older.created_at -= 1_000;
        let mut newer = GenerationRecord::new(&GenerationRequest::new("u1", "B", "second"));
        newer.state = GenerationState::Ready;
        let other = GenerationRecord::new(&GenerationRequest::new("u2", "A", "theirs"));

        let trail = vec![RepairAttempt {
            attempt_number: 1,
            defects_before: Vec::new(),
            transformations_applied: vec![Transformation::applied(
                TransformationKind::DefaultFill,
                "hook.path",
                "filled",
            )],
            defects_after: Vec::new(),
        }];

        store.save(&older, &[]).unwrap();
        store.save(&newer, &trail).unwrap();
        store.save(&other, &[]).unwrap();

        let listed = store.list("u1", None).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].request_id, newer.request_id);
        assert_eq!(store.list("u1", Some(1)).unwrap().len(), 1);

        let loaded = store.get("u1", &newer.request_id).unwrap().unwrap();
        assert_eq!(loaded.state, GenerationState::Ready);
        assert!(store.get("u2", &newer.request_id).unwrap().is_none());
        assert_eq!(store.audit_trail("u1", &newer.request_id).unwrap(), trail);

        assert!(store.delete("u1", &newer.request_id).unwrap());
        assert!(store.get("u1", &newer.request_id).unwrap().is_none());
        assert!(store.audit_trail("u1", &newer.request_id).unwrap().is_empty());
    }
}
