//! Error types for the generation pipeline

use thiserror::Error;

/// Local programmer errors raised by the graph builder API.
///
/// These are not [`Defect`](crate::models::Defect)s: a candidate parsed from
/// untrusted input bypasses these checks and gets its problems reported by
/// the validator instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node id '{0}' already exists in the graph")]
    DuplicateId(String),

    #[error("Connection endpoint '{0}' does not exist in the graph")]
    UnknownEndpoint(String),
}

/// Errors raised while building a node catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Node type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Alias '{alias}' points to unknown node type '{target}'")]
    UnknownAliasTarget { alias: String, target: String },

    #[error("Fallback workflow does not validate: {0}")]
    FallbackInvalid(String),
}

/// Attempted orchestrator state change that the state machine does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Illegal generation state transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

/// Errors from the template/synthesis collaborator.
#[derive(Error, Debug)]
pub enum CandidateError {
    #[error("Candidate could not be parsed into a workflow graph: {0}")]
    Unparseable(String),

    #[error("Candidate source failed: {0}")]
    Source(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the external workflow execution engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Workflow engine did not answer within {0}ms")]
    Timeout(u64),

    #[error("Workflow engine rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Workflow engine unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the gateway's backoff policy may retry this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Unavailable(_) => true,
            EngineError::Rejected { status, .. } => *status == 429 || *status >= 500,
            EngineError::Http(err) => err.is_connect() || err.is_timeout(),
            EngineError::Timeout(_) | EngineError::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_is_retryable() {
        assert!(EngineError::Unavailable("down".to_string()).is_retryable());
        assert!(
            EngineError::Rejected {
                status: 503,
                message: "maintenance".to_string()
            }
            .is_retryable()
        );
        assert!(
            EngineError::Rejected {
                status: 429,
                message: "slow down".to_string()
            }
            .is_retryable()
        );
        assert!(
            !EngineError::Rejected {
                status: 400,
                message: "bad workflow".to_string()
            }
            .is_retryable()
        );
        assert!(!EngineError::Timeout(100).is_retryable());
    }
}
