//! CLI configuration file support
//!
//! Loads configuration from ~/.config/clixen/config.toml

use std::path::PathBuf;
use std::time::Duration;

use clixen_core::deploy::RetryPolicy;
use serde::{Deserialize, Serialize};

const N8N_API_KEY_ENV: &str = "N8N_API_KEY";
const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_OWNER: &str = "local";

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClixenConfig {
    #[serde(default)]
    pub default: DefaultConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Default database path
    pub db_path: Option<String>,
    /// Owner used when none is given on the command line
    pub owner: Option<String>,
}

/// n8n connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Activate workflows after deploying them
    #[serde(default)]
    pub activate: bool,
    /// Deployment budget in seconds, retries included
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Minimum keyword score before a template is preferred over synthesis
    pub min_template_score: Option<usize>,
}

impl ClixenConfig {
    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clixen").join("config.toml"))
    }

    /// Export configured API keys unless the environment already has them.
    ///
    /// # Safety
    /// Modifies environment variables; only call early in main() before
    /// spawning threads.
    pub fn apply_api_key_env(&self) {
        if let Some(key) = &self.engine.api_key
            && std::env::var(N8N_API_KEY_ENV).is_err()
        {
            // SAFETY: Called early in main() before spawning threads
            unsafe { std::env::set_var(N8N_API_KEY_ENV, key) };
        }
        if let Some(key) = &self.synthesis.api_key
            && std::env::var(OPENAI_API_KEY_ENV).is_err()
        {
            // SAFETY: Called early in main() before spawning threads
            unsafe { std::env::set_var(OPENAI_API_KEY_ENV, key) };
        }
    }

    pub fn owner(&self, explicit: Option<String>) -> String {
        explicit
            .or_else(|| self.default.owner.clone())
            .unwrap_or_else(|| DEFAULT_OWNER.to_string())
    }

    pub fn deploy_timeout(&self) -> Option<Duration> {
        self.engine.timeout_secs.map(Duration::from_secs)
    }
}

pub fn n8n_api_key() -> Option<String> {
    non_empty_env(N8N_API_KEY_ENV)
}

pub fn openai_api_key() -> Option<String> {
    non_empty_env(OPENAI_API_KEY_ENV)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
