pub mod audit;
pub mod defect;
pub mod generation;
pub mod node;
pub mod workflow;

pub use audit::{RepairAttempt, Transformation, TransformationKind, TransformationOutcome};
pub use defect::{ConnectionRef, Defect, DefectKind, Severity, blocking_count};
pub use generation::{
    FailureKind, GenerationFailure, GenerationRecord, GenerationRequest, GenerationState,
    USER_FAILURE_MESSAGE,
};
pub use node::{NodeInstance, Position};
pub use workflow::{Connection, GraphStatus, WorkflowGraph};
