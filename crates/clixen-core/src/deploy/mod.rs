//! Deployment to the external workflow engine.

pub mod export;
pub mod gateway;
pub mod memory;
pub mod n8n;
pub mod retry;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::models::FailureKind;

pub use export::to_n8n_json;
pub use gateway::{DeploymentGateway, namespaced_name, owner_tag};
pub use memory::InMemoryEngine;
pub use n8n::N8nClient;
pub use retry::RetryPolicy;

/// The hosted workflow execution engine, seen as a black box.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Upsert keyed by workflow name; returns the engine's workflow id.
    async fn create_or_update_workflow(&self, workflow: &Value) -> Result<String, EngineError>;

    /// Names of existing workflows starting with `prefix`.
    async fn list_existing_names(&self, prefix: &str) -> Result<BTreeSet<String>, EngineError>;

    async fn activate(&self, external_id: &str) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentError {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&EngineError> for DeploymentError {
    fn from(err: &EngineError) -> Self {
        let kind = match err {
            EngineError::Timeout(_) => FailureKind::Timeout,
            EngineError::Rejected { .. } => FailureKind::Rejected,
            EngineError::Unavailable(_) | EngineError::Http(_) => FailureKind::Unavailable,
            EngineError::Json(_) => FailureKind::Internal,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub success: bool,
    pub namespaced_name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    /// No workflow with this name existed before the upsert.
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub error: Option<DeploymentError>,
}

impl DeploymentResult {
    pub fn failed(namespaced_name: impl Into<String>, err: &EngineError) -> Self {
        Self {
            success: false,
            namespaced_name: namespaced_name.into(),
            external_id: None,
            created: false,
            activated: false,
            error: Some(err.into()),
        }
    }
}
