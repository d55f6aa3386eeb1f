pub mod candidate;
pub mod deploy;
pub mod engine;
pub mod error;
mod http_client;
pub mod models;
pub mod node;
pub mod paths;
pub mod storage;

pub use models::*;

use std::sync::Arc;

use anyhow::Context;
use candidate::CandidateSource;
use deploy::{DeploymentGateway, RetryPolicy, WorkflowEngine};
use engine::{GenerationOrchestrator, OrchestratorConfig};
use node::NodeCatalog;
use storage::GenerationStore;
use tracing::info;

/// Core application state shared by the CLI and embedders.
///
/// Holds the read-only node catalog and the generation store; orchestrators
/// are built per collaborator set on top of it.
pub struct ClixenCore {
    pub catalog: Arc<NodeCatalog>,
    pub store: Arc<GenerationStore>,
}

impl ClixenCore {
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        let store = Arc::new(GenerationStore::open(db_path)?);
        let catalog = Arc::new(NodeCatalog::builtin().clone());

        info!(node_types = catalog.len(), "Initializing Clixen");

        Ok(Self { catalog, store })
    }

    pub fn gateway(
        &self,
        engine: Arc<dyn WorkflowEngine>,
        retry: RetryPolicy,
        activate: bool,
    ) -> DeploymentGateway {
        DeploymentGateway::new(engine, self.catalog.clone())
            .with_retry(retry)
            .with_activation(activate)
    }

    /// Orchestrator that persists every outcome into this core's store.
    pub fn orchestrator(
        &self,
        source: Arc<dyn CandidateSource>,
        gateway: DeploymentGateway,
        config: OrchestratorConfig,
    ) -> anyhow::Result<GenerationOrchestrator> {
        let orchestrator =
            GenerationOrchestrator::new(self.catalog.clone(), source, Arc::new(gateway))
                .context("Fallback workflow failed validation")?;
        Ok(orchestrator
            .with_store(self.store.clone())
            .with_config(config))
    }
}
