//! Turn raw candidate JSON into a [`WorkflowGraph`].
//!
//! Parsing is lenient on purpose: anything recoverable (missing ids, missing
//! types, connections to unknown nodes) is kept in the graph so the validator
//! can report it. Only a document that is not a workflow at all is rejected.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::CandidateError;
use crate::models::{Connection, NodeInstance, Position, WorkflowGraph};

pub fn parse_candidate(
    raw: &str,
    owner_id: &str,
    name: &str,
) -> Result<WorkflowGraph, CandidateError> {
    let document: Value = serde_json::from_str(raw.trim())
        .map_err(|e| CandidateError::Unparseable(format!("Invalid JSON: {e}")))?;
    let Value::Object(root) = document else {
        return Err(CandidateError::Unparseable(
            "Top level is not a JSON object".to_string(),
        ));
    };
    let Some(Value::Array(raw_nodes)) = root.get("nodes") else {
        return Err(CandidateError::Unparseable(
            "Field 'nodes' is missing or not an array".to_string(),
        ));
    };

    let mut nodes = Vec::with_capacity(raw_nodes.len());
    // n8n connection maps reference nodes by display name
    let mut ids_by_name = HashMap::new();
    for (index, raw_node) in raw_nodes.iter().enumerate() {
        let (node, display_name) = parse_node(index, raw_node);
        if let Some(display_name) = display_name {
            ids_by_name.entry(display_name).or_insert_with(|| node.id.clone());
        }
        nodes.push(node);
    }

    let connections = match root.get("connections") {
        Some(Value::Array(list)) => parse_connection_list(list),
        Some(Value::Object(map)) => parse_connection_map(map, &ids_by_name),
        _ => Vec::new(),
    };

    Ok(WorkflowGraph::from_parts(name, owner_id, nodes, connections))
}

/// Locate the first balanced JSON object in free text, e.g. a model reply
/// wrapped in prose or a fenced code block.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_node(index: usize, raw: &Value) -> (NodeInstance, Option<String>) {
    let Value::Object(fields) = raw else {
        return (NodeInstance::new(generated_id(index), ""), None);
    };

    let display_name = non_empty_str(fields, &["name"]);
    let id = non_empty_str(fields, &["id"])
        .or_else(|| display_name.clone())
        .unwrap_or_else(|| generated_id(index));
    let type_id = non_empty_str(fields, &["type", "type_id", "typeId"]).unwrap_or_default();

    let mut node = NodeInstance::new(id, type_id);
    for key in ["parameters", "params"] {
        if let Some(Value::Object(params)) = fields.get(key) {
            node.params = params.clone();
            break;
        }
    }
    node.position = fields.get("position").and_then(parse_position);

    (node, display_name)
}

fn generated_id(index: usize) -> String {
    format!("node_{}", index + 1)
}

fn parse_position(value: &Value) -> Option<Position> {
    match value {
        Value::Array(items) if items.len() == 2 => Some(Position {
            x: items[0].as_f64()?,
            y: items[1].as_f64()?,
        }),
        Value::Object(fields) => Some(Position {
            x: fields.get("x")?.as_f64()?,
            y: fields.get("y")?.as_f64()?,
        }),
        _ => None,
    }
}

fn parse_connection_list(list: &[Value]) -> Vec<Connection> {
    list.iter()
        .filter_map(Value::as_object)
        .map(|fields| Connection {
            from_node_id: non_empty_str(fields, &["fromNodeId", "from_node_id", "from"])
                .unwrap_or_default(),
            from_port: port(fields, &["fromPort", "from_port"]),
            to_node_id: non_empty_str(fields, &["toNodeId", "to_node_id", "to"])
                .unwrap_or_default(),
            to_port: port(fields, &["toPort", "to_port"]),
        })
        .collect()
}

/// `{"Source": {"main": [[{"node": "Target", "type": "main", "index": 0}]]}}`,
/// where the outer array position is the source output port.
fn parse_connection_map(
    map: &Map<String, Value>,
    ids_by_name: &HashMap<String, String>,
) -> Vec<Connection> {
    let resolve = |reference: &str| {
        ids_by_name
            .get(reference)
            .cloned()
            .unwrap_or_else(|| reference.to_string())
    };

    let mut connections = Vec::new();
    for (source, outputs) in map {
        let Some(Value::Array(ports)) = outputs.get("main") else {
            continue;
        };
        let from_node_id = resolve(source);
        for (from_port, targets) in ports.iter().enumerate() {
            let Value::Array(targets) = targets else {
                continue;
            };
            for target in targets.iter().filter_map(Value::as_object) {
                let to_node_id = non_empty_str(target, &["node"])
                    .map(|name| resolve(&name))
                    .unwrap_or_default();
                connections.push(Connection {
                    from_node_id: from_node_id.clone(),
                    from_port,
                    to_node_id,
                    to_port: port(target, &["index"]),
                });
            }
        }
    }
    connections
}

fn non_empty_str(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn port(fields: &Map<String, Value>, keys: &[&str]) -> usize {
    keys.iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_u64))
        .map_or(0, |port| usize::try_from(port).unwrap_or(usize::MAX))
}
