//! In-process workflow engine for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::WorkflowEngine;
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct StoredWorkflow {
    pub id: String,
    pub body: Value,
    pub active: bool,
}

#[derive(Default)]
struct EngineState {
    workflows: BTreeMap<String, StoredWorkflow>,
    next_id: u64,
    upsert_calls: u32,
    scripted_failures: VecDeque<EngineError>,
}

/// Keeps workflows in memory, keyed by name like the real engine's upsert.
#[derive(Default)]
pub struct InMemoryEngine {
    state: Mutex<EngineState>,
    latency: Option<Duration>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every upsert.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next upserts fail with `errors`, in order.
    pub async fn fail_next(&self, errors: impl IntoIterator<Item = EngineError>) {
        self.state.lock().await.scripted_failures.extend(errors);
    }

    pub async fn workflow(&self, name: &str) -> Option<StoredWorkflow> {
        self.state.lock().await.workflows.get(name).cloned()
    }

    pub async fn workflow_count(&self) -> usize {
        self.state.lock().await.workflows.len()
    }

    pub async fn upsert_calls(&self) -> u32 {
        self.state.lock().await.upsert_calls
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryEngine {
    async fn create_or_update_workflow(&self, workflow: &Value) -> Result<String, EngineError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        state.upsert_calls += 1;
        if let Some(err) = state.scripted_failures.pop_front() {
            return Err(err);
        }

        let name = workflow
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Rejected {
                status: 400,
                message: "Workflow has no name".to_string(),
            })?
            .to_string();

        if let Some(existing) = state.workflows.get_mut(&name) {
            existing.body = workflow.clone();
            return Ok(existing.id.clone());
        }

        state.next_id += 1;
        let id = format!("wf-{}", state.next_id);
        state.workflows.insert(
            name,
            StoredWorkflow {
                id: id.clone(),
                body: workflow.clone(),
                active: false,
            },
        );
        Ok(id)
    }

    async fn list_existing_names(&self, prefix: &str) -> Result<BTreeSet<String>, EngineError> {
        let state = self.state.lock().await;
        Ok(state
            .workflows
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn activate(&self, external_id: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let workflow = state
            .workflows
            .values_mut()
            .find(|workflow| workflow.id == external_id)
            .ok_or_else(|| EngineError::Rejected {
                status: 404,
                message: format!("Workflow {external_id} not found"),
            })?;
        workflow.active = true;
        Ok(())
    }
}
