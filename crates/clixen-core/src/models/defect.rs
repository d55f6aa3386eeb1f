use std::fmt;

use serde::{Deserialize, Serialize};

use super::workflow::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefectKind {
    DuplicateId,
    UnknownType,
    MissingRequiredParam,
    PortArityMismatch,
    DanglingConnection,
    NoTrigger,
    Cycle,
    UnreachableNode,
    UnknownParam,
}

impl DefectKind {
    pub fn severity(&self) -> Severity {
        match self {
            DefectKind::UnreachableNode | DefectKind::UnknownParam => Severity::Warning,
            _ => Severity::Blocking,
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    Warning,
}

/// Points at one connection of the graph a defect was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub index: usize,
    pub from_node_id: String,
    pub from_port: usize,
    pub to_node_id: String,
    pub to_port: usize,
}

impl ConnectionRef {
    pub fn new(index: usize, connection: &Connection) -> Self {
        Self {
            index,
            from_node_id: connection.from_node_id.clone(),
            from_port: connection.from_port,
            to_node_id: connection.to_node_id.clone(),
            to_port: connection.to_port,
        }
    }

    /// Whether `connection` still has the endpoints this reference captured.
    pub fn matches(&self, connection: &Connection) -> bool {
        self.from_node_id == connection.from_node_id
            && self.from_port == connection.from_port
            && self.to_node_id == connection.to_node_id
            && self.to_port == connection.to_port
    }
}

/// A single problem found by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    pub kind: DefectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_ref: Option<ConnectionRef>,
    /// Parameter name, for parameter-level defects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub detail: String,
    pub severity: Severity,
}

impl Defect {
    pub fn new(kind: DefectKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            node_id: None,
            connection_ref: None,
            param: None,
            detail: detail.into(),
            severity: kind.severity(),
        }
    }

    pub fn on_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn on_connection(mut self, index: usize, connection: &Connection) -> Self {
        self.connection_ref = Some(ConnectionRef::new(index, connection));
        self
    }

    pub fn for_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

pub fn blocking_count(defects: &[Defect]) -> usize {
    defects.iter().filter(|defect| defect.is_blocking()).count()
}
