//! Generation orchestrator: candidate -> validate/repair loop -> fallback ->
//! namespaced deployment.
//!
//! Every request is driven through [`GenerationState`] transitions; an
//! illegal transition aborts the request as an internal failure instead of
//! silently continuing.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use super::fallback::FallbackTemplate;
use super::repair::RepairEngine;
use super::validator::Validator;
use crate::candidate::{CandidateSource, parse_candidate};
use crate::deploy::{DeploymentGateway, DeploymentResult};
use crate::error::{CatalogError, TransitionError};
use crate::models::{
    Defect, FailureKind, GenerationFailure, GenerationRecord, GenerationRequest, GenerationState,
    GraphStatus, RepairAttempt, WorkflowGraph, blocking_count,
};
use crate::node::NodeCatalog;
use crate::storage::GenerationStore;

pub const MAX_REPAIR_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock budget for the deployment call, retries included.
    pub deploy_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deploy_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything known about a request once the orchestrator is done with it.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub record: GenerationRecord,
    pub graph: WorkflowGraph,
    /// Defects of `graph` from the last validation pass.
    pub defects: Vec<Defect>,
    pub audit: Vec<RepairAttempt>,
    pub validation_passes: u32,
    /// States visited, starting with `Draft`.
    pub states: Vec<GenerationState>,
    pub deployment: Option<DeploymentResult>,
}

impl GenerationOutcome {
    pub fn state(&self) -> GenerationState {
        self.record.state
    }

    pub fn failure(&self) -> Option<&GenerationFailure> {
        self.record.failure.as_ref()
    }
}

/// Tracks the current state and refuses transitions the machine does not allow.
struct StateMachine {
    history: Vec<GenerationState>,
}

impl StateMachine {
    fn new() -> Self {
        Self {
            history: vec![GenerationState::Draft],
        }
    }

    fn current(&self) -> GenerationState {
        self.history[self.history.len() - 1]
    }

    fn advance(&mut self, next: GenerationState) -> Result<(), TransitionError> {
        let next = self.current().transition(next)?;
        self.history.push(next);
        Ok(())
    }
}

pub struct GenerationOrchestrator {
    catalog: Arc<NodeCatalog>,
    fallback: Arc<FallbackTemplate>,
    source: Arc<dyn CandidateSource>,
    gateway: Arc<DeploymentGateway>,
    store: Option<Arc<GenerationStore>>,
    config: OrchestratorConfig,
}

impl GenerationOrchestrator {
    /// Fails when the fallback workflow does not validate against `catalog`.
    pub fn new(
        catalog: Arc<NodeCatalog>,
        source: Arc<dyn CandidateSource>,
        gateway: Arc<DeploymentGateway>,
    ) -> Result<Self, CatalogError> {
        let fallback = Arc::new(FallbackTemplate::new(&catalog)?);
        Ok(Self {
            catalog,
            fallback,
            source,
            gateway,
            store: None,
            config: OrchestratorConfig::default(),
        })
    }

    pub fn with_store(mut self, store: Arc<GenerationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the pipeline up to `Ready` or `FallbackReady` without deploying.
    pub async fn prepare(&self, request: &GenerationRequest) -> GenerationOutcome {
        let outcome = self.prepare_inner(request).await;
        self.persist(&outcome);
        outcome
    }

    /// Run the full pipeline, including deployment.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let mut outcome = self.prepare_inner(request).await;
        if matches!(
            outcome.state(),
            GenerationState::Ready | GenerationState::FallbackReady
        ) {
            self.deploy(&mut outcome).await;
        }
        self.persist(&outcome);
        outcome
    }

    async fn prepare_inner(&self, request: &GenerationRequest) -> GenerationOutcome {
        let mut record = GenerationRecord::new(request);
        info!(
            request_id = %request.request_id,
            owner_id = %request.owner_id,
            correlation_id = %record.correlation_id,
            source = self.source.name(),
            "Generation started"
        );

        let mut machine = StateMachine::new();
        match self.run_pipeline(request, &record, &mut machine).await {
            Ok(mut outcome) => {
                outcome.states = machine.history;
                outcome.record.state = outcome.states[outcome.states.len() - 1];
                outcome.record.status = outcome.graph.status;
                outcome.record.repair_attempts = outcome.audit.len() as u32;
                outcome.record.touch();
                info!(
                    request_id = %request.request_id,
                    state = %outcome.record.state,
                    repair_attempts = outcome.record.repair_attempts,
                    validation_passes = outcome.validation_passes,
                    "Generation prepared"
                );
                outcome
            }
            Err(err) => {
                error!(
                    correlation_id = %record.correlation_id,
                    error = %err,
                    "Generation aborted"
                );
                record.state = GenerationState::Failed;
                record.status = GraphStatus::Failed;
                record.failure = Some(GenerationFailure::new(
                    FailureKind::Internal,
                    record.correlation_id.clone(),
                ));
                record.touch();

                let mut graph = WorkflowGraph::new(&request.name, &request.owner_id);
                graph.status = GraphStatus::Failed;
                let mut states = machine.history;
                states.push(GenerationState::Failed);
                GenerationOutcome {
                    record,
                    graph,
                    defects: Vec::new(),
                    audit: Vec::new(),
                    validation_passes: 0,
                    states,
                    deployment: None,
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &GenerationRequest,
        record: &GenerationRecord,
        machine: &mut StateMachine,
    ) -> Result<GenerationOutcome, TransitionError> {
        let candidate = match self.source.request_candidate(&request.intent).await {
            Ok(raw) => parse_candidate(&raw, &request.owner_id, &request.name),
            Err(err) => Err(err),
        };

        let mut outcome = GenerationOutcome {
            record: record.clone(),
            graph: WorkflowGraph::new(&request.name, &request.owner_id),
            defects: Vec::new(),
            audit: Vec::new(),
            validation_passes: 0,
            states: Vec::new(),
            deployment: None,
        };

        let mut graph = match candidate {
            Ok(graph) => graph,
            Err(err) => {
                warn!(
                    correlation_id = %record.correlation_id,
                    error = %err,
                    "Candidate unusable, switching to fallback"
                );
                machine.advance(GenerationState::FallbackReady)?;
                outcome.graph = self.fallback.instantiate(&request.owner_id, &request.name);
                return Ok(outcome);
            }
        };

        let validator = Validator::new(&self.catalog);
        let repair = RepairEngine::new(&self.catalog);

        let mut defects = validator.validate(&graph);
        outcome.validation_passes += 1;
        machine.advance(GenerationState::Validated)?;

        loop {
            let blocking = blocking_count(&defects);
            if blocking == 0 {
                machine.advance(GenerationState::Ready)?;
                graph.status = if outcome.audit.is_empty() {
                    GraphStatus::Validated
                } else {
                    GraphStatus::Repaired
                };
                outcome.graph = graph;
                outcome.defects = defects;
                return Ok(outcome);
            }
            if outcome.audit.len() as u32 >= MAX_REPAIR_ATTEMPTS {
                info!(
                    correlation_id = %record.correlation_id,
                    blocking,
                    "Repair attempts exhausted, switching to fallback"
                );
                break;
            }

            machine.advance(GenerationState::Repairing)?;
            let transformations = repair.repair(&mut graph, &defects);
            let after = validator.validate(&graph);
            outcome.validation_passes += 1;
            machine.advance(GenerationState::Validated)?;

            let remaining = blocking_count(&after);
            outcome.audit.push(RepairAttempt {
                attempt_number: outcome.audit.len() as u32 + 1,
                defects_before: std::mem::take(&mut defects),
                transformations_applied: transformations,
                defects_after: after.clone(),
            });
            defects = after;

            if remaining > 0 && remaining >= blocking {
                info!(
                    correlation_id = %record.correlation_id,
                    before = blocking,
                    after = remaining,
                    "Repair made no progress, switching to fallback"
                );
                break;
            }
        }

        machine.advance(GenerationState::FallbackReady)?;
        outcome.graph = self.fallback.instantiate(&request.owner_id, &request.name);
        Ok(outcome)
    }

    async fn deploy(&self, outcome: &mut GenerationOutcome) {
        let namespaced = self.gateway.namespace(&outcome.graph);
        let correlation_id = outcome.record.correlation_id.clone();

        let result = tokio::time::timeout(
            self.config.deploy_timeout,
            self.gateway.deploy(&namespaced),
        )
        .await;

        let failure_kind = match &result {
            Ok(deployment) if deployment.success => None,
            Ok(deployment) => Some(
                deployment
                    .error
                    .as_ref()
                    .map(|e| e.kind)
                    .unwrap_or(FailureKind::Unavailable),
            ),
            Err(_) => Some(FailureKind::Timeout),
        };

        outcome.graph = namespaced;
        outcome.deployment = result.ok();

        let next = match failure_kind {
            None => {
                outcome.graph.status = GraphStatus::Deployed;
                outcome.record.external_id = outcome
                    .deployment
                    .as_ref()
                    .and_then(|d| d.external_id.clone());
                GenerationState::Deployed
            }
            Some(kind) => {
                let detail = outcome
                    .deployment
                    .as_ref()
                    .and_then(|d| d.error.as_ref())
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| {
                        format!(
                            "Deployment exceeded {}ms",
                            self.config.deploy_timeout.as_millis()
                        )
                    });
                error!(
                    correlation_id = %correlation_id,
                    kind = ?kind,
                    detail = %detail,
                    "Deployment failed"
                );
                outcome.graph.status = GraphStatus::Failed;
                outcome.record.failure = Some(GenerationFailure::new(kind, correlation_id));
                GenerationState::Failed
            }
        };

        match outcome.state().transition(next) {
            Ok(state) => outcome.record.state = state,
            Err(err) => {
                error!(error = %err, "Unexpected state after deployment");
                outcome.record.state = GenerationState::Failed;
            }
        }
        outcome.states.push(outcome.record.state);
        outcome.record.status = outcome.graph.status;
        outcome.record.touch();
    }

    fn persist(&self, outcome: &GenerationOutcome) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(&outcome.record, &outcome.audit) {
            warn!(
                request_id = %outcome.record.request_id,
                error = %err,
                "Failed to persist generation record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::TemplateLibrary;
    use crate::deploy::{InMemoryEngine, RetryPolicy, WorkflowEngine};
    use crate::error::{CandidateError, EngineError};
    use crate::models::{DefectKind, USER_FAILURE_MESSAGE};
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::tempdir;

    struct StaticSource(String);

    #[async_trait]
    impl CandidateSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn request_candidate(&self, _intent: &str) -> Result<String, CandidateError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl CandidateSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn request_candidate(&self, _intent: &str) -> Result<String, CandidateError> {
            Err(CandidateError::Source("connection reset".to_string()))
        }
    }

    fn catalog() -> Arc<NodeCatalog> {
        Arc::new(NodeCatalog::builtin().clone())
    }

    fn orchestrator_with(
        source: Arc<dyn CandidateSource>,
        engine: Arc<InMemoryEngine>,
    ) -> GenerationOrchestrator {
        let catalog = catalog();
        let gateway = DeploymentGateway::new(engine, catalog.clone()).with_retry(RetryPolicy::none());
        GenerationOrchestrator::new(catalog, source, Arc::new(gateway)).unwrap()
    }

    fn orchestrator(candidate: serde_json::Value) -> GenerationOrchestrator {
        orchestrator_with(
            Arc::new(StaticSource(candidate.to_string())),
            Arc::new(InMemoryEngine::new()),
        )
    }

    fn request(owner: &str) -> GenerationRequest {
        GenerationRequest::new(owner, "Daily Report", "send me a daily report")
    }

    #[tokio::test]
    async fn test_missing_param_with_default_is_repaired_in_one_pass() {
        let orchestrator = orchestrator(json!({
            "nodes": [
                { "id": "hook", "type": "n8n-nodes-base.webhook" },
                { "id": "done", "type": "n8n-nodes-base.noOp" }
            ],
            "connections": [{ "fromNodeId": "hook", "toNodeId": "done" }]
        }));

        let outcome = orchestrator.prepare(&request("u1")).await;
        assert_eq!(outcome.state(), GenerationState::Ready);
        assert_eq!(outcome.audit.len(), 1);
        assert!(outcome.defects.is_empty());
        assert_eq!(outcome.graph.status, GraphStatus::Repaired);
        assert_eq!(
            outcome.states,
            vec![
                GenerationState::Draft,
                GenerationState::Validated,
                GenerationState::Repairing,
                GenerationState::Validated,
                GenerationState::Ready,
            ]
        );
    }

    #[tokio::test]
    async fn test_dangling_without_trigger_falls_back() {
        let orchestrator = orchestrator(json!({
            "nodes": [{ "id": "a", "type": "n8n-nodes-base.noOp" }],
            "connections": [{ "fromNodeId": "a", "toNodeId": "ghost" }]
        }));

        let outcome = orchestrator.prepare(&request("u1")).await;
        assert_eq!(outcome.state(), GenerationState::FallbackReady);
        assert_eq!(outcome.graph.status, GraphStatus::Fallback);
        assert_eq!(outcome.graph.owner_id(), "u1");
        assert_eq!(outcome.graph.name, "Daily Report");

        let first = &outcome.audit[0];
        assert!(first.defects_before.iter().any(|d| d.kind == DefectKind::DanglingConnection));
        assert_eq!(
            first.defects_after.iter().map(|d| d.kind).collect::<Vec<_>>(),
            vec![DefectKind::NoTrigger]
        );
        assert!(outcome.validation_passes <= MAX_REPAIR_ATTEMPTS + 1);
    }

    #[tokio::test]
    async fn test_unparseable_candidate_falls_back_without_repair() {
        let orchestrator = orchestrator_with(
            Arc::new(StaticSource("this is not json".to_string())),
            Arc::new(InMemoryEngine::new()),
        );

        let outcome = orchestrator.prepare(&request("u1")).await;
        assert_eq!(outcome.state(), GenerationState::FallbackReady);
        assert!(outcome.audit.is_empty());
        assert_eq!(outcome.validation_passes, 0);
        assert_eq!(
            outcome.states,
            vec![GenerationState::Draft, GenerationState::FallbackReady]
        );
    }

    #[tokio::test]
    async fn test_candidate_source_error_falls_back() {
        let orchestrator =
            orchestrator_with(Arc::new(BrokenSource), Arc::new(InMemoryEngine::new()));
        let outcome = orchestrator.prepare(&request("u1")).await;
        assert_eq!(outcome.state(), GenerationState::FallbackReady);
    }

    #[tokio::test]
    async fn test_three_node_cycle_is_broken() {
        let orchestrator = orchestrator(json!({
            "nodes": [
                { "id": "start", "type": "n8n-nodes-base.manualTrigger" },
                { "id": "A", "type": "n8n-nodes-base.noOp" },
                { "id": "B", "type": "n8n-nodes-base.noOp" },
                { "id": "C", "type": "n8n-nodes-base.noOp" }
            ],
            "connections": [
                { "fromNodeId": "start", "toNodeId": "A" },
                { "fromNodeId": "A", "toNodeId": "B" },
                { "fromNodeId": "B", "toNodeId": "C" },
                { "fromNodeId": "C", "toNodeId": "A" }
            ]
        }));

        let outcome = orchestrator.prepare(&request("u1")).await;
        assert_eq!(outcome.state(), GenerationState::Ready);
        assert!(!outcome.graph.detect_cycle());
        assert_eq!(outcome.graph.connections.len(), 3);
    }

    #[tokio::test]
    async fn test_two_owners_same_name_do_not_collide() {
        let engine = Arc::new(InMemoryEngine::new());
        let orchestrator = orchestrator_with(Arc::new(TemplateLibrary::builtin()), engine.clone());

        let first = orchestrator.generate(&request("u1")).await;
        let second = orchestrator.generate(&request("u2")).await;

        assert_eq!(first.state(), GenerationState::Deployed);
        assert_eq!(second.state(), GenerationState::Deployed);
        assert_eq!(first.graph.name, "u1__Daily Report");
        assert_eq!(second.graph.name, "u2__Daily Report");
        assert_ne!(first.record.external_id, second.record.external_id);

        let u1 = engine.list_existing_names("u1__").await.unwrap();
        let u2 = engine.list_existing_names("u2__").await.unwrap();
        assert!(u1.is_disjoint(&u2));
        assert_eq!(engine.workflow_count().await, 2);
    }

    #[tokio::test]
    async fn test_prepare_is_deterministic() {
        let candidate = json!({
            "nodes": [
                { "id": "tick", "type": "cron" },
                { "id": "x", "type": "n8n-nodes-base.code" },
                { "id": "y", "type": "n8n-nodes-base.noOp" }
            ],
            "connections": [
                { "fromNodeId": "tick", "toNodeId": "x" },
                { "fromNodeId": "x", "toNodeId": "y" },
                { "fromNodeId": "y", "toNodeId": "x" }
            ]
        });
        let orchestrator = orchestrator(candidate);

        let first = orchestrator.prepare(&request("u1")).await;
        let second = orchestrator.prepare(&request("u1")).await;
        assert_eq!(first.state(), GenerationState::Ready);
        assert_eq!(first.graph, second.graph);
        assert_eq!(first.audit, second.audit);
    }

    #[tokio::test]
    async fn test_passes_are_bounded_and_fallback_is_valid() {
        let candidates = [
            json!({ "nodes": [{ "id": "a", "type": "x" }, { "id": "a", "type": "y" }] }),
            json!({ "nodes": [{ "id": "h", "type": "n8n-nodes-base.httpRequest" }] }),
            json!({ "nodes": [], "connections": [{ "fromNodeId": "p", "toNodeId": "q" }] }),
        ];

        for candidate in candidates {
            let orchestrator = orchestrator(candidate);
            let outcome = orchestrator.prepare(&request("u1")).await;
            assert!(outcome.validation_passes <= MAX_REPAIR_ATTEMPTS + 1);
            assert!(outcome.audit.len() as u32 <= MAX_REPAIR_ATTEMPTS);
            assert_eq!(outcome.state(), GenerationState::FallbackReady);

            let validator = Validator::new(NodeCatalog::builtin());
            assert_eq!(blocking_count(&validator.validate(&outcome.graph)), 0);
            for attempt in &outcome.audit {
                assert!(
                    blocking_count(&attempt.defects_after) < blocking_count(&attempt.defects_before)
                        || attempt.attempt_number == outcome.audit.len() as u32
                );
            }
        }
    }

    #[tokio::test]
    async fn test_deploy_timeout_fails_request() {
        let engine = Arc::new(InMemoryEngine::new().with_latency(Duration::from_millis(500)));
        let orchestrator = orchestrator_with(Arc::new(TemplateLibrary::builtin()), engine)
            .with_config(OrchestratorConfig {
                deploy_timeout: Duration::from_millis(20),
            });

        let outcome = orchestrator.generate(&request("u1")).await;
        assert_eq!(outcome.state(), GenerationState::Failed);
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(failure.user_message, USER_FAILURE_MESSAGE);
        assert_eq!(failure.correlation_id, outcome.record.correlation_id);
    }

    #[tokio::test]
    async fn test_rejected_deploy_fails_with_opaque_message() {
        let engine = Arc::new(InMemoryEngine::new());
        engine
            .fail_next([EngineError::Rejected {
                status: 400,
                message: "node type not installed".to_string(),
            }])
            .await;
        let orchestrator = orchestrator_with(Arc::new(TemplateLibrary::builtin()), engine);

        let outcome = orchestrator.generate(&request("u1")).await;
        assert_eq!(outcome.state(), GenerationState::Failed);
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Rejected);
        assert!(!failure.user_message.contains("node type"));
        assert_eq!(outcome.graph.status, GraphStatus::Failed);
    }

    #[tokio::test]
    async fn test_outcome_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clixen.db");
        let store = Arc::new(GenerationStore::open(path.to_str().unwrap()).unwrap());
        let orchestrator = orchestrator_with(
            Arc::new(TemplateLibrary::builtin()),
            Arc::new(InMemoryEngine::new()),
        )
        .with_store(store.clone());

        let request = request("u1");
        let outcome = orchestrator.generate(&request).await;

        let record = store.get("u1", &request.request_id).unwrap().unwrap();
        assert_eq!(record.state, GenerationState::Deployed);
        assert_eq!(record.external_id, outcome.record.external_id);
        assert_eq!(
            store.audit_trail("u1", &request.request_id).unwrap(),
            outcome.audit
        );
    }
}
