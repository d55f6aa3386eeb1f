//! Deterministic repair transformations for validator defects.
//!
//! One call applies every transformation once, in priority order:
//! default-fill, prune-dangling, type-substitute, cycle-break. Each defect
//! the engine knows how to handle yields exactly one [`Transformation`]
//! entry, applied or not.

use tracing::debug;

use crate::models::{
    Defect, DefectKind, Transformation, TransformationKind, WorkflowGraph,
};
use crate::node::NodeCatalog;

pub struct RepairEngine<'a> {
    catalog: &'a NodeCatalog,
}

impl<'a> RepairEngine<'a> {
    pub fn new(catalog: &'a NodeCatalog) -> Self {
        Self { catalog }
    }

    /// Apply all transformations once. Never fails; a transformation that
    /// cannot help is recorded as not applicable.
    pub fn repair(&self, graph: &mut WorkflowGraph, defects: &[Defect]) -> Vec<Transformation> {
        let mut log = Vec::new();

        for defect in of_kind(defects, DefectKind::MissingRequiredParam) {
            log.push(self.default_fill(graph, defect));
        }
        for defect in of_kind(defects, DefectKind::DanglingConnection) {
            log.push(prune_dangling(graph, defect));
        }
        for defect in of_kind(defects, DefectKind::UnknownType) {
            log.push(self.type_substitute(graph, defect));
        }
        for defect in of_kind(defects, DefectKind::Cycle) {
            log.push(break_cycle(graph, defect));
        }

        debug!(
            transformations = log.len(),
            applied = log.iter().filter(|t| t.is_applied()).count(),
            "Repair pass finished"
        );
        log
    }

    fn default_fill(&self, graph: &mut WorkflowGraph, defect: &Defect) -> Transformation {
        let kind = TransformationKind::DefaultFill;
        let (Some(node_id), Some(param)) = (defect.node_id.as_deref(), defect.param.as_deref())
        else {
            return Transformation::not_applicable(kind, "-", "Defect names no node parameter");
        };
        let target = format!("{node_id}.{param}");

        let catalog = self.catalog;
        let node = graph.nodes.iter_mut().find(|node| {
            node.id == node_id && catalog.contains(&node.type_id) && !node.has_param(param)
        });
        let Some(node) = node else {
            return Transformation::not_applicable(kind, target, "Parameter is no longer missing");
        };

        match catalog
            .lookup(&node.type_id)
            .and_then(|spec| spec.required_default(param))
        {
            Some(default) => {
                node.params.insert(param.to_string(), default.clone());
                Transformation::applied(kind, target, format!("Filled with catalog default {default}"))
            }
            None => Transformation::not_applicable(kind, target, "Catalog declares no default"),
        }
    }

    fn type_substitute(&self, graph: &mut WorkflowGraph, defect: &Defect) -> Transformation {
        let kind = TransformationKind::TypeSubstitute;
        let Some(node_id) = defect.node_id.as_deref() else {
            return Transformation::not_applicable(kind, "-", "Defect names no node");
        };

        let usage = graph.port_usage(node_id);
        let catalog = self.catalog;
        let Some(node) = graph
            .nodes
            .iter_mut()
            .find(|node| node.id == node_id && !catalog.contains(&node.type_id))
        else {
            return Transformation::not_applicable(kind, node_id, "Node type is already known");
        };

        let Some(spec) = catalog.substitute_for(&node.type_id, usage) else {
            return Transformation::not_applicable(
                kind,
                node_id,
                format!("No known type fits '{}'", node.type_id),
            );
        };

        let previous = std::mem::replace(&mut node.type_id, spec.type_id.clone());
        for param in &spec.required_params {
            if let Some(default) = &param.default
                && !node.has_param(&param.name)
            {
                node.params.insert(param.name.clone(), default.clone());
            }
        }
        Transformation::applied(
            kind,
            node_id,
            format!("Replaced '{previous}' with '{}'", spec.type_id),
        )
    }
}

fn of_kind(defects: &[Defect], kind: DefectKind) -> impl Iterator<Item = &Defect> {
    defects.iter().filter(move |defect| defect.kind == kind)
}

fn prune_dangling(graph: &mut WorkflowGraph, defect: &Defect) -> Transformation {
    let kind = TransformationKind::PruneDangling;
    let Some(reference) = &defect.connection_ref else {
        return Transformation::not_applicable(kind, "-", "Defect names no connection");
    };
    let target = format!(
        "{}[{}] -> {}[{}]",
        reference.from_node_id, reference.from_port, reference.to_node_id, reference.to_port
    );

    let position = graph.connections.iter().position(|connection| {
        reference.matches(connection)
            && !(graph.contains_node(&connection.from_node_id)
                && graph.contains_node(&connection.to_node_id))
    });
    match position {
        Some(position) => {
            graph.connections.remove(position);
            Transformation::applied(kind, target, "Removed connection to missing node")
        }
        None => Transformation::not_applicable(kind, target, "Connection no longer dangles"),
    }
}

/// Remove the closing connection with the highest source port; on a tie the
/// later connection goes.
fn break_cycle(graph: &mut WorkflowGraph, defect: &Defect) -> Transformation {
    let kind = TransformationKind::CycleBreak;
    let closing = graph.closing_connections();
    let chosen = closing
        .into_iter()
        .max_by_key(|&index| (graph.connections[index].from_port, index));

    let Some(index) = chosen else {
        let target = defect
            .connection_ref
            .as_ref()
            .map(|r| format!("#{}", r.index))
            .unwrap_or_else(|| "-".to_string());
        return Transformation::not_applicable(kind, target, "Graph is already acyclic");
    };

    let removed = graph.connections.remove(index);
    Transformation::applied(kind, removed.to_string(), "Removed cycle-closing connection")
}
