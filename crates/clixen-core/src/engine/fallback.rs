//! Fallback workflow substituted when a candidate cannot be repaired.

use tracing::info;

use super::validator::Validator;
use crate::error::CatalogError;
use crate::models::{Connection, GraphStatus, NodeInstance, WorkflowGraph};
use crate::node::NodeCatalog;
use crate::node::catalog::{MANUAL_TRIGGER, NO_OP};

/// Minimal pre-vetted workflow used when a candidate cannot be repaired.
#[derive(Debug, Clone)]
pub struct FallbackTemplate {
    graph: WorkflowGraph,
}

impl FallbackTemplate {
    /// Build and validate the manual-trigger -> no-op template against
    /// `catalog`. Fails if it would not pass validation.
    pub fn new(catalog: &NodeCatalog) -> Result<Self, CatalogError> {
        let graph = WorkflowGraph::from_parts(
            "Fallback",
            "",
            vec![
                NodeInstance::new("trigger", MANUAL_TRIGGER).at(250.0, 300.0),
                NodeInstance::new("noop", NO_OP).at(470.0, 300.0),
            ],
            vec![Connection::new("trigger", 0, "noop", 0)],
        );
        Self::from_graph(catalog, graph)
    }

    pub fn from_graph(catalog: &NodeCatalog, graph: WorkflowGraph) -> Result<Self, CatalogError> {
        let defects = Validator::new(catalog).validate(&graph);
        if let Some(defect) = defects.iter().find(|d| d.is_blocking()) {
            return Err(CatalogError::FallbackInvalid(defect.to_string()));
        }
        info!(nodes = graph.nodes.len(), "Fallback workflow validated");
        Ok(Self { graph })
    }

    /// Copy of the template carrying the request's owner and name.
    pub fn instantiate(&self, owner_id: &str, name: &str) -> WorkflowGraph {
        let mut graph = WorkflowGraph::from_parts(
            name,
            owner_id,
            self.graph.nodes.clone(),
            self.graph.connections.clone(),
        );
        graph.status = GraphStatus::Fallback;
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::blocking_count;

    #[test]
    fn test_fallback_is_valid_and_retagged() {
        let catalog = NodeCatalog::builtin();
        let template = FallbackTemplate::new(catalog).unwrap();
        let graph = template.instantiate("u7", "Daily Report");

        assert_eq!(graph.owner_id(), "u7");
        assert_eq!(graph.name, "Daily Report");
        assert_eq!(graph.status, GraphStatus::Fallback);
        assert_eq!(blocking_count(&Validator::new(catalog).validate(&graph)), 0);
    }

    #[test]
    fn test_invalid_fallback_is_rejected() {
        let graph = WorkflowGraph::from_parts(
            "Broken",
            "",
            vec![NodeInstance::new("only", NO_OP)],
            Vec::new(),
        );
        let err = FallbackTemplate::from_graph(NodeCatalog::builtin(), graph).unwrap_err();
        assert!(matches!(err, CatalogError::FallbackInvalid(_)));
    }
}
