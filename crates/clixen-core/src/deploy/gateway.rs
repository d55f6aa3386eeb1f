//! Namespaced, idempotent deployment with bounded retry.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::export::to_n8n_json;
use super::retry::RetryPolicy;
use super::{DeploymentResult, WorkflowEngine};
use crate::error::EngineError;
use crate::models::WorkflowGraph;
use crate::node::NodeCatalog;
use crate::node::catalog::WEBHOOK;

const NAMESPACE_SEPARATOR: &str = "__";
const WEBHOOK_PATH_PARAM: &str = "path";

/// Owner id encoded into `[A-Za-z0-9-]` plus `_XX` escapes, usable in names
/// and URL paths.
///
/// `_` and every other byte outside that set is written as `_` followed by
/// two uppercase hex digits, so distinct owners always get distinct tags and
/// no tag contains `__`. The empty owner maps to `_`, which no escaped tag
/// can equal.
pub fn owner_tag(owner_id: &str) -> String {
    if owner_id.is_empty() {
        return "_".to_string();
    }
    let mut tag = String::with_capacity(owner_id.len());
    for byte in owner_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            tag.push(byte as char);
        } else {
            tag.push_str(&format!("_{byte:02X}"));
        }
    }
    tag
}

pub fn namespaced_name(owner_id: &str, name: &str) -> String {
    let prefix = namespace_prefix(owner_id);
    if name.starts_with(&prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

fn namespace_prefix(owner_id: &str) -> String {
    format!("{}{NAMESPACE_SEPARATOR}", owner_tag(owner_id))
}

pub struct DeploymentGateway {
    engine: Arc<dyn WorkflowEngine>,
    catalog: Arc<NodeCatalog>,
    retry: RetryPolicy,
    activate: bool,
}

impl DeploymentGateway {
    pub fn new(engine: Arc<dyn WorkflowEngine>, catalog: Arc<NodeCatalog>) -> Self {
        Self {
            engine,
            catalog,
            retry: RetryPolicy::default(),
            activate: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_activation(mut self, activate: bool) -> Self {
        self.activate = activate;
        self
    }

    /// Copy of `graph` with its name and webhook paths prefixed by the owner
    /// tag. Applying it twice changes nothing.
    pub fn namespace(&self, graph: &WorkflowGraph) -> WorkflowGraph {
        let tag = owner_tag(graph.owner_id());
        let mut namespaced = graph.clone();
        namespaced.name = namespaced_name(graph.owner_id(), &graph.name);

        for node in namespaced.nodes.iter_mut().filter(|n| n.type_id == WEBHOOK) {
            if let Some(Value::String(path)) = node.params.get_mut(WEBHOOK_PATH_PARAM) {
                let trimmed = path.trim_start_matches('/');
                if !trimmed.starts_with(&format!("{tag}/")) {
                    let prefixed = format!("{tag}/{trimmed}");
                    *path = prefixed;
                }
            }
        }
        namespaced
    }

    /// Namespace and upsert `graph`. Never panics; failures are reported in
    /// the result.
    pub async fn deploy(&self, graph: &WorkflowGraph) -> DeploymentResult {
        let namespaced = self.namespace(graph);
        let name = namespaced.name.clone();

        match self.deploy_namespaced(&namespaced).await {
            Ok(result) => result,
            Err(err) => {
                warn!(workflow = %name, error = %err, "Deployment failed");
                DeploymentResult::failed(name, &err)
            }
        }
    }

    async fn deploy_namespaced(
        &self,
        graph: &WorkflowGraph,
    ) -> Result<DeploymentResult, EngineError> {
        let prefix = namespace_prefix(graph.owner_id());
        let existing = self
            .call_with_retry("list", || self.engine.list_existing_names(&prefix))
            .await?;
        let created = !existing.contains(&graph.name);

        let payload = to_n8n_json(graph, &self.catalog);
        let external_id = self
            .call_with_retry("upsert", || self.engine.create_or_update_workflow(&payload))
            .await?;

        if self.activate {
            self.call_with_retry("activate", || self.engine.activate(&external_id))
                .await?;
        }

        info!(
            workflow = %graph.name,
            external_id = %external_id,
            created,
            activated = self.activate,
            "Workflow deployed"
        );

        Ok(DeploymentResult {
            success: true,
            namespaced_name: graph.name.clone(),
            external_id: Some(external_id),
            created,
            activated: self.activate,
            error: None,
        })
    }

    async fn call_with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying workflow engine call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
