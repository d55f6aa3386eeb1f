use anyhow::Result;
use std::path::PathBuf;

const CLIXEN_DIR: &str = ".clixen";
const DB_FILE: &str = "clixen.db";
const LOGS_DIR: &str = "logs";

/// Environment variable to override the Clixen data directory.
const CLIXEN_DIR_ENV: &str = "CLIXEN_DIR";

/// Resolve the Clixen data directory.
/// Priority: CLIXEN_DIR env var > ~/.clixen/
pub fn resolve_clixen_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CLIXEN_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(CLIXEN_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

pub fn ensure_clixen_dir() -> Result<PathBuf> {
    let dir = resolve_clixen_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Database path: ~/.clixen/clixen.db, creating the directory if needed.
pub fn ensure_database_path_string() -> Result<String> {
    Ok(ensure_clixen_dir()?
        .join(DB_FILE)
        .to_string_lossy()
        .into_owned())
}

/// Log directory: ~/.clixen/logs/
pub fn logs_dir() -> Result<PathBuf> {
    let dir = resolve_clixen_dir()?.join(LOGS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
