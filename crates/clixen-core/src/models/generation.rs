//! Generation request lifecycle: request, state machine, persisted record.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::workflow::GraphStatus;
use crate::error::TransitionError;

/// Shown to end users for every failed generation; details stay in the logs.
pub const USER_FAILURE_MESSAGE: &str =
    "We could not create this automation. Please adjust your request and try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: String,
    pub owner_id: String,
    pub name: String,
    pub intent: String,
}

impl GenerationRequest {
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        intent: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            intent: intent.into(),
        }
    }
}

/// Orchestrator state for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Draft,
    Validated,
    Repairing,
    Ready,
    FallbackReady,
    Deployed,
    Failed,
}

impl GenerationState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Draft => "draft",
            GenerationState::Validated => "validated",
            GenerationState::Repairing => "repairing",
            GenerationState::Ready => "ready",
            GenerationState::FallbackReady => "fallback_ready",
            GenerationState::Deployed => "deployed",
            GenerationState::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: GenerationState) -> bool {
        use GenerationState::*;
        matches!(
            (self, next),
            (Draft, Validated)
                | (Draft, FallbackReady)
                | (Validated, Ready)
                | (Validated, Repairing)
                | (Validated, FallbackReady)
                | (Repairing, Validated)
                | (Ready, Deployed)
                | (Ready, Failed)
                | (FallbackReady, Deployed)
                | (FallbackReady, Failed)
        )
    }

    pub fn transition(self, next: GenerationState) -> Result<GenerationState, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Deployed | GenerationState::Failed)
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Rejected,
    Unavailable,
    Internal,
}

/// Terminal failure as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub correlation_id: String,
    pub user_message: String,
}

impl GenerationFailure {
    pub fn new(kind: FailureKind, correlation_id: impl Into<String>) -> Self {
        Self {
            kind,
            correlation_id: correlation_id.into(),
            user_message: USER_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (reference: {})", self.user_message, self.correlation_id)
    }
}

/// Metadata persisted per request next to its repair audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub request_id: String,
    pub owner_id: String,
    pub name: String,
    pub intent: String,
    pub state: GenerationState,
    pub status: GraphStatus,
    #[serde(default)]
    pub external_id: Option<String>,
    pub correlation_id: String,
    pub repair_attempts: u32,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub failure: Option<GenerationFailure>,
}

impl GenerationRecord {
    pub fn new(request: &GenerationRequest) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            request_id: request.request_id.clone(),
            owner_id: request.owner_id.clone(),
            name: request.name.clone(),
            intent: request.intent.clone(),
            state: GenerationState::Draft,
            status: GraphStatus::Draft,
            external_id: None,
            correlation_id: Uuid::new_v4().to_string(),
            repair_attempts: 0,
            created_at: now,
            updated_at: now,
            failure: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().timestamp_millis();
    }
}
