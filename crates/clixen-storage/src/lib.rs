//! Clixen Storage - Low-level storage abstraction layer
//!
//! This crate provides the persistence layer for Clixen, using redb as the
//! embedded database. It exposes byte-level APIs so that it does not depend
//! on the core crate's models.
//!
//! Every table is owner-scoped: keys start with the (escaped) owner id, and
//! listings are prefix scans over one owner. Row-level isolation therefore
//! lives here and not in the generation pipeline.
//!
//! # Tables
//!
//! - `generation:data/index` - Generation request records
//! - `repair_audit` - Repair audit trails

pub mod audit;
pub mod generation;
pub mod keys;
mod owner_table;

use anyhow::Result;
use redb::Database;
use std::sync::Arc;
use tracing::debug;

pub use audit::AuditTrailStorage;
pub use generation::GenerationStorage;
pub use owner_table::OwnerScopedTable;

/// Central storage manager that initializes all storage subsystems
pub struct Storage {
    db: Arc<Database>,
    pub generations: GenerationStorage,
    pub audit_trails: AuditTrailStorage,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will create the database file if it doesn't exist and initialize
    /// all required tables.
    pub fn new(path: &str) -> Result<Self> {
        debug!(path, "Opening storage");
        let db = Arc::new(Database::create(path)?);

        let generations = GenerationStorage::new(db.clone())?;
        let audit_trails = AuditTrailStorage::new(db.clone())?;

        Ok(Self {
            db,
            generations,
            audit_trails,
        })
    }

    /// Get a reference to the underlying database
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}
