//! Structural and semantic checks over a workflow graph.
//!
//! Checks run in a fixed order and each check walks nodes and connections in
//! graph order, so the defect list for a given graph is always the same.

use std::collections::{HashMap, HashSet};

use crate::models::{Defect, DefectKind, WorkflowGraph};
use crate::node::NodeCatalog;

pub struct Validator<'a> {
    catalog: &'a NodeCatalog,
}

impl<'a> Validator<'a> {
    pub fn new(catalog: &'a NodeCatalog) -> Self {
        Self { catalog }
    }

    pub fn validate(&self, graph: &WorkflowGraph) -> Vec<Defect> {
        let mut defects = Vec::new();

        self.check_duplicate_ids(graph, &mut defects);
        self.check_unknown_types(graph, &mut defects);
        self.check_required_params(graph, &mut defects);
        self.check_port_arity(graph, &mut defects);
        self.check_dangling_connections(graph, &mut defects);
        let has_trigger = self.check_trigger(graph, &mut defects);
        self.check_cycles(graph, &mut defects);

        if has_trigger {
            self.check_reachability(graph, &mut defects);
        }
        self.check_unknown_params(graph, &mut defects);

        defects
    }

    fn check_duplicate_ids(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) {
        let mut seen = HashSet::new();
        for node in &graph.nodes {
            if !seen.insert(node.id.as_str()) {
                defects.push(
                    Defect::new(
                        DefectKind::DuplicateId,
                        format!("Node id '{}' is used more than once", node.id),
                    )
                    .on_node(&node.id),
                );
            }
        }
    }

    fn check_unknown_types(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) {
        for node in &graph.nodes {
            if !self.catalog.contains(&node.type_id) {
                let detail = if node.type_id.is_empty() {
                    format!("Node '{}' has no type", node.id)
                } else {
                    format!("Node '{}' has unknown type '{}'", node.id, node.type_id)
                };
                defects.push(Defect::new(DefectKind::UnknownType, detail).on_node(&node.id));
            }
        }
    }

    fn check_required_params(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) {
        for node in &graph.nodes {
            let Some(spec) = self.catalog.lookup(&node.type_id) else {
                continue;
            };
            for param in &spec.required_params {
                if !node.has_param(&param.name) {
                    defects.push(
                        Defect::new(
                            DefectKind::MissingRequiredParam,
                            format!(
                                "Node '{}' is missing required parameter '{}'",
                                node.id, param.name
                            ),
                        )
                        .on_node(&node.id)
                        .for_param(&param.name),
                    );
                }
            }
        }
    }

    fn check_port_arity(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) {
        let types = first_types(graph);
        for (index, connection) in graph.connections.iter().enumerate() {
            let from = types
                .get(connection.from_node_id.as_str())
                .and_then(|type_id| self.catalog.lookup(type_id));
            let to = types
                .get(connection.to_node_id.as_str())
                .and_then(|type_id| self.catalog.lookup(type_id));
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };

            let mut problems = Vec::new();
            if connection.from_port >= from.output_ports {
                problems.push(format!(
                    "output port {} of '{}' (has {})",
                    connection.from_port, connection.from_node_id, from.output_ports
                ));
            }
            if connection.to_port >= to.input_ports {
                problems.push(format!(
                    "input port {} of '{}' (has {})",
                    connection.to_port, connection.to_node_id, to.input_ports
                ));
            }
            if !problems.is_empty() {
                defects.push(
                    Defect::new(
                        DefectKind::PortArityMismatch,
                        format!("Connection uses missing {}", problems.join(" and ")),
                    )
                    .on_connection(index, connection),
                );
            }
        }
    }

    fn check_dangling_connections(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) {
        for (index, connection) in graph.connections.iter().enumerate() {
            let missing: Vec<&str> = [&connection.from_node_id, &connection.to_node_id]
                .into_iter()
                .filter(|id| !graph.contains_node(id))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                defects.push(
                    Defect::new(
                        DefectKind::DanglingConnection,
                        format!("Connection {connection} references missing node(s): {}", missing.join(", ")),
                    )
                    .on_connection(index, connection),
                );
            }
        }
    }

    fn check_trigger(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) -> bool {
        let has_trigger = !graph.trigger_ids(self.catalog).is_empty();
        if !has_trigger {
            defects.push(Defect::new(
                DefectKind::NoTrigger,
                "Workflow has no trigger node",
            ));
        }
        has_trigger
    }

    fn check_cycles(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) {
        for index in graph.closing_connections() {
            let connection = &graph.connections[index];
            defects.push(
                Defect::new(
                    DefectKind::Cycle,
                    format!("Connection {connection} closes a cycle"),
                )
                .on_connection(index, connection),
            );
        }
    }

    fn check_reachability(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) {
        let reachable = graph.reachable_from_triggers(self.catalog);
        let mut reported = HashSet::new();
        for node in &graph.nodes {
            if !reachable.contains(&node.id) && reported.insert(node.id.as_str()) {
                defects.push(
                    Defect::new(
                        DefectKind::UnreachableNode,
                        format!("Node '{}' is not reachable from any trigger", node.id),
                    )
                    .on_node(&node.id),
                );
            }
        }
    }

    fn check_unknown_params(&self, graph: &WorkflowGraph, defects: &mut Vec<Defect>) {
        for node in &graph.nodes {
            let Some(spec) = self.catalog.lookup(&node.type_id) else {
                continue;
            };
            for name in node.params.keys() {
                if !spec.declares_param(name) {
                    defects.push(
                        Defect::new(
                            DefectKind::UnknownParam,
                            format!(
                                "Parameter '{name}' is not declared by {}",
                                spec.type_id
                            ),
                        )
                        .on_node(&node.id)
                        .for_param(name),
                    );
                }
            }
        }
    }
}

/// Type of the first node carrying each id.
fn first_types(graph: &WorkflowGraph) -> HashMap<&str, &str> {
    let mut types = HashMap::new();
    for node in &graph.nodes {
        types
            .entry(node.id.as_str())
            .or_insert(node.type_id.as_str());
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Connection, NodeInstance, Severity, blocking_count};
    use crate::node::catalog::{HTTP_REQUEST, IF, MANUAL_TRIGGER, NO_OP, WEBHOOK};
    use serde_json::json;

    fn kinds(defects: &[Defect]) -> Vec<DefectKind> {
        defects.iter().map(|d| d.kind).collect()
    }

    fn valid_graph() -> WorkflowGraph {
        WorkflowGraph::from_parts(
            "Ping",
            "u1",
            vec![
                NodeInstance::new("start", MANUAL_TRIGGER),
                NodeInstance::new("fetch", HTTP_REQUEST)
                    .with_param("url", json!("https://example.com/health")),
                NodeInstance::new("done", NO_OP),
            ],
            vec![
                Connection::new("start", 0, "fetch", 0),
                Connection::new("fetch", 0, "done", 0),
            ],
        )
    }

    #[test]
    fn test_valid_graph_has_no_defects() {
        let validator = Validator::new(NodeCatalog::builtin());
        assert!(validator.validate(&valid_graph()).is_empty());
    }

    #[test]
    fn test_defects_follow_check_order() {
        let graph = WorkflowGraph::from_parts(
            "Broken",
            "u1",
            vec![
                NodeInstance::new("a", NO_OP),
                NodeInstance::new("a", NO_OP),
                NodeInstance::new("b", "n8n-nodes-base.imaginary"),
                NodeInstance::new("c", HTTP_REQUEST),
            ],
            vec![
                Connection::new("a", 3, "c", 0),
                Connection::new("c", 0, "ghost", 0),
                Connection::new("c", 0, "a", 0),
            ],
        );

        let defects = Validator::new(NodeCatalog::builtin()).validate(&graph);
        assert_eq!(
            kinds(&defects),
            vec![
                DefectKind::DuplicateId,
                DefectKind::UnknownType,
                DefectKind::MissingRequiredParam,
                DefectKind::PortArityMismatch,
                DefectKind::DanglingConnection,
                DefectKind::NoTrigger,
                DefectKind::Cycle,
            ]
        );
        assert_eq!(defects[2].param.as_deref(), Some("url"));
        assert_eq!(defects[3].connection_ref.as_ref().unwrap().index, 0);
        assert_eq!(defects[4].connection_ref.as_ref().unwrap().index, 1);
        assert_eq!(defects[6].connection_ref.as_ref().unwrap().index, 2);
    }

    #[test]
    fn test_validate_is_deterministic() {
        let mut graph = valid_graph();
        graph.nodes.push(NodeInstance::new("x", "custom.unknown"));
        graph.connections.push(Connection::new("done", 0, "start", 0));
        graph.connections.push(Connection::new("x", 0, "nowhere", 0));

        let validator = Validator::new(NodeCatalog::builtin());
        let first = validator.validate(&graph);
        for _ in 0..5 {
            assert_eq!(validator.validate(&graph), first);
        }
    }

    #[test]
    fn test_empty_type_is_unknown() {
        let mut graph = valid_graph();
        graph.nodes.push(NodeInstance::new("blank", ""));
        let defects = Validator::new(NodeCatalog::builtin()).validate(&graph);
        assert!(
            defects
                .iter()
                .any(|d| d.kind == DefectKind::UnknownType && d.node_id.as_deref() == Some("blank"))
        );
    }

    #[test]
    fn test_blank_required_param_counts_as_missing() {
        let mut graph = valid_graph();
        graph.nodes[1].params.insert("url".to_string(), json!(""));
        let defects = Validator::new(NodeCatalog::builtin()).validate(&graph);
        assert_eq!(kinds(&defects), vec![DefectKind::MissingRequiredParam]);
    }

    #[test]
    fn test_if_node_second_output_is_valid() {
        let graph = WorkflowGraph::from_parts(
            "Branch",
            "u1",
            vec![
                NodeInstance::new("hook", WEBHOOK).with_param("path", json!("orders")),
                NodeInstance::new("check", IF)
                    .with_param("conditions", json!({ "conditions": [] })),
                NodeInstance::new("yes", NO_OP),
                NodeInstance::new("no", NO_OP),
            ],
            vec![
                Connection::new("hook", 0, "check", 0),
                Connection::new("check", 0, "yes", 0),
                Connection::new("check", 1, "no", 0),
            ],
        );
        assert!(Validator::new(NodeCatalog::builtin()).validate(&graph).is_empty());
    }

    #[test]
    fn test_connection_into_trigger_is_arity_mismatch() {
        let mut graph = valid_graph();
        graph.connections.push(Connection::new("done", 0, "start", 0));
        let defects = Validator::new(NodeCatalog::builtin()).validate(&graph);
        assert_eq!(
            kinds(&defects),
            vec![DefectKind::PortArityMismatch, DefectKind::Cycle]
        );
    }

    #[test]
    fn test_warnings_do_not_block() {
        let mut graph = valid_graph();
        graph.nodes.push(NodeInstance::new("island", NO_OP));
        graph.nodes[1]
            .params
            .insert("colour".to_string(), json!("blue"));

        let defects = Validator::new(NodeCatalog::builtin()).validate(&graph);
        assert_eq!(
            kinds(&defects),
            vec![DefectKind::UnreachableNode, DefectKind::UnknownParam]
        );
        assert!(defects.iter().all(|d| d.severity == Severity::Warning));
        assert_eq!(blocking_count(&defects), 0);
    }

    #[test]
    fn test_no_reachability_warnings_without_trigger() {
        let graph = WorkflowGraph::from_parts(
            "Lonely",
            "u1",
            vec![NodeInstance::new("only", NO_OP)],
            Vec::new(),
        );
        let defects = Validator::new(NodeCatalog::builtin()).validate(&graph);
        assert_eq!(kinds(&defects), vec![DefectKind::NoTrigger]);
    }
}
