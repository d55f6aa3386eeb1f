//! n8n workflow JSON export.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::models::WorkflowGraph;
use crate::node::NodeCatalog;

const LAYOUT_ORIGIN_X: f64 = 250.0;
const LAYOUT_STEP_X: f64 = 220.0;
const LAYOUT_Y: f64 = 300.0;

/// Render `graph` in the n8n public API workflow shape. Node ids double as
/// n8n node names, which is what the connection map is keyed by.
pub fn to_n8n_json(graph: &WorkflowGraph, catalog: &NodeCatalog) -> Value {
    let nodes: Vec<Value> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let type_version = catalog
                .lookup(&node.type_id)
                .map(|spec| spec.type_version)
                .unwrap_or(1.0);
            let (x, y) = node
                .position
                .map(|p| (p.x, p.y))
                .unwrap_or((LAYOUT_ORIGIN_X + LAYOUT_STEP_X * index as f64, LAYOUT_Y));
            json!({
                "id": node.id,
                "name": node.id,
                "type": node.type_id,
                "typeVersion": type_version,
                "position": [x, y],
                "parameters": node.params,
            })
        })
        .collect();

    let mut outputs: BTreeMap<&str, Vec<Vec<Value>>> = BTreeMap::new();
    for connection in &graph.connections {
        // ports the source type does not declare cannot be rendered
        let declared = graph
            .node(&connection.from_node_id)
            .and_then(|node| catalog.lookup(&node.type_id))
            .map_or(0, |spec| spec.output_ports);
        if connection.from_port >= declared {
            continue;
        }
        let ports = outputs.entry(connection.from_node_id.as_str()).or_default();
        if ports.len() <= connection.from_port {
            ports.resize_with(connection.from_port + 1, Vec::new);
        }
        ports[connection.from_port].push(json!({
            "node": connection.to_node_id,
            "type": "main",
            "index": connection.to_port,
        }));
    }
    let connections: Map<String, Value> = outputs
        .into_iter()
        .map(|(source, ports)| (source.to_string(), json!({ "main": ports })))
        .collect();

    json!({
        "name": graph.name,
        "nodes": nodes,
        "connections": connections,
        "settings": { "executionOrder": "v1" },
    })
}
