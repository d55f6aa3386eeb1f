//! CLI setup module
//!
//! Opens the embedded Clixen core for commands that need the store.

use anyhow::Result;
use clixen_core::{ClixenCore, paths};

/// Build the embedded Clixen core. An explicit path wins over the config
/// file, which wins over ~/.clixen/clixen.db.
pub fn prepare_core(db_path: Option<String>) -> Result<ClixenCore> {
    let db_path = match db_path {
        Some(path) => path,
        None => paths::ensure_database_path_string()?,
    };
    ClixenCore::new(&db_path)
}
