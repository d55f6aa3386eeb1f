use serde::{Deserialize, Serialize};

use super::defect::Defect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    DefaultFill,
    PruneDangling,
    TypeSubstitute,
    CycleBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationOutcome {
    Applied,
    NotApplicable,
}

/// One named repair operation and what it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub kind: TransformationKind,
    pub target: String,
    pub outcome: TransformationOutcome,
    pub detail: String,
}

impl Transformation {
    pub fn applied(kind: TransformationKind, target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            outcome: TransformationOutcome::Applied,
            detail: detail.into(),
        }
    }

    pub fn not_applicable(
        kind: TransformationKind,
        target: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            outcome: TransformationOutcome::NotApplicable,
            detail: detail.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.outcome == TransformationOutcome::Applied
    }
}

/// One pass of the repair loop, as recorded in a request's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub attempt_number: u32,
    pub defects_before: Vec<Defect>,
    pub transformations_applied: Vec<Transformation>,
    pub defects_after: Vec<Defect>,
}

impl RepairAttempt {
    pub fn applied_count(&self) -> usize {
        self.transformations_applied
            .iter()
            .filter(|t| t.is_applied())
            .count()
    }
}
