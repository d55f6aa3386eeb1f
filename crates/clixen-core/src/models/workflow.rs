use std::collections::{BTreeSet, HashMap};
use std::fmt;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};

use super::node::NodeInstance;
use crate::error::GraphError;
use crate::node::{NodeCatalog, PortUsage};

/// Lifecycle status of a workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphStatus {
    Draft,
    Validated,
    Repaired,
    Fallback,
    Deployed,
    Failed,
}

impl fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GraphStatus::Draft => "draft",
            GraphStatus::Validated => "validated",
            GraphStatus::Repaired => "repaired",
            GraphStatus::Fallback => "fallback",
            GraphStatus::Deployed => "deployed",
            GraphStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Directed edge from an output port of one node to an input port of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from_node_id: String,
    pub from_port: usize,
    pub to_node_id: String,
    pub to_port: usize,
}

impl Connection {
    pub fn new(
        from_node_id: impl Into<String>,
        from_port: usize,
        to_node_id: impl Into<String>,
        to_port: usize,
    ) -> Self {
        Self {
            from_node_id: from_node_id.into(),
            from_port,
            to_node_id: to_node_id.into(),
            to_port,
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] -> {}[{}]",
            self.from_node_id, self.from_port, self.to_node_id, self.to_port
        )
    }
}

/// A candidate or finished workflow: nodes, connections and ownership.
///
/// `owner_id` is fixed at construction; there is no way to change it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub name: String,
    owner_id: String,
    pub nodes: Vec<NodeInstance>,
    pub connections: Vec<Connection>,
    pub status: GraphStatus,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self::from_parts(name, owner_id, Vec::new(), Vec::new())
    }

    /// Assemble a graph without the insertion checks of [`add_node`] and
    /// [`add_connection`], so that defects in untrusted candidates survive
    /// until validation.
    ///
    /// [`add_node`]: WorkflowGraph::add_node
    /// [`add_connection`]: WorkflowGraph::add_connection
    pub fn from_parts(
        name: impl Into<String>,
        owner_id: impl Into<String>,
        nodes: Vec<NodeInstance>,
        connections: Vec<Connection>,
    ) -> Self {
        Self {
            name: name.into(),
            owner_id: owner_id.into(),
            nodes,
            connections,
            status: GraphStatus::Draft,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn add_node(&mut self, node: NodeInstance) -> Result<&NodeInstance, GraphError> {
        if self.contains_node(&node.id) {
            return Err(GraphError::DuplicateId(node.id));
        }
        self.nodes.push(node);
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    /// Insert a connection. Port bounds are left to the validator; only
    /// endpoints missing from the graph are refused.
    pub fn add_connection(&mut self, connection: Connection) -> Result<&Connection, GraphError> {
        for endpoint in [&connection.from_node_id, &connection.to_node_id] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::UnknownEndpoint(endpoint.clone()));
            }
        }
        self.connections.push(connection);
        Ok(&self.connections[self.connections.len() - 1])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }

    /// First node with the given id.
    pub fn node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Ids of nodes whose type is a trigger in `catalog`, in node order.
    pub fn trigger_ids<'a>(&'a self, catalog: &NodeCatalog) -> Vec<&'a str> {
        self.nodes
            .iter()
            .filter(|node| catalog.lookup(&node.type_id).is_some_and(|spec| spec.is_trigger()))
            .map(|node| node.id.as_str())
            .collect()
    }

    /// Ports of `node_id` that existing connections use. Saturates on
    /// port numbers taken verbatim from candidate JSON.
    pub fn port_usage(&self, node_id: &str) -> PortUsage {
        let mut usage = PortUsage::default();
        for connection in &self.connections {
            if connection.from_node_id == node_id {
                usage.outputs = usage.outputs.max(connection.from_port.saturating_add(1));
            }
            if connection.to_node_id == node_id {
                usage.inputs = usage.inputs.max(connection.to_port.saturating_add(1));
            }
        }
        usage
    }

    /// Ids reachable by breadth-first search from every trigger node.
    pub fn reachable_from_triggers(&self, catalog: &NodeCatalog) -> BTreeSet<String> {
        let (graph, indices) = self.to_digraph();
        let mut reachable = BTreeSet::new();

        for trigger in self.trigger_ids(catalog) {
            let Some(&start) = indices.get(trigger) else {
                continue;
            };
            let mut bfs = Bfs::new(&graph, start);
            while let Some(index) = bfs.next(&graph) {
                reachable.insert(graph[index].to_string());
            }
        }

        reachable
    }

    /// Whether resolvable connections form a directed cycle.
    pub fn detect_cycle(&self) -> bool {
        let (graph, _) = self.to_digraph();
        is_cyclic_directed(&graph)
    }

    /// Indices of connections that close a cycle.
    ///
    /// Depth-first search with recursion-stack tracking, started from nodes in
    /// node order and following connections in connection order; an edge into
    /// a node still on the stack closes a cycle. The result is deterministic
    /// for a given graph and removing all returned connections leaves the
    /// graph acyclic.
    pub fn closing_connections(&self) -> Vec<usize> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let positions = self.first_positions();
        let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); self.nodes.len()];
        for (index, connection) in self.connections.iter().enumerate() {
            let from = positions.get(connection.from_node_id.as_str());
            let to = positions.get(connection.to_node_id.as_str());
            if let (Some(&from), Some(&to)) = (from, to) {
                adjacency[from].push((to, index));
            }
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut closing = Vec::new();

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            marks[start] = Mark::OnStack;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                match adjacency[node].get(frame.1) {
                    Some(&(target, connection)) => {
                        frame.1 += 1;
                        match marks[target] {
                            Mark::Unvisited => {
                                marks[target] = Mark::OnStack;
                                stack.push((target, 0));
                            }
                            Mark::OnStack => closing.push(connection),
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[node] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }

        closing
    }

    /// Position of the first node carrying each id.
    fn first_positions(&self) -> HashMap<&str, usize> {
        let mut positions = HashMap::new();
        for (position, node) in self.nodes.iter().enumerate() {
            positions.entry(node.id.as_str()).or_insert(position);
        }
        positions
    }

    fn to_digraph(&self) -> (DiGraph<&str, usize>, HashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for node in &self.nodes {
            if !indices.contains_key(node.id.as_str()) {
                let index = graph.add_node(node.id.as_str());
                indices.insert(node.id.as_str(), index);
            }
        }

        for (position, connection) in self.connections.iter().enumerate() {
            let from = indices.get(connection.from_node_id.as_str());
            let to = indices.get(connection.to_node_id.as_str());
            if let (Some(&from), Some(&to)) = (from, to) {
                graph.add_edge(from, to, position);
            }
        }

        (graph, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::catalog::{HTTP_REQUEST, MANUAL_TRIGGER, NO_OP};

    fn linear_graph() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("Linear", "u1");
        graph
            .add_node(NodeInstance::new("start", MANUAL_TRIGGER))
            .unwrap();
        graph.add_node(NodeInstance::new("fetch", HTTP_REQUEST)).unwrap();
        graph.add_node(NodeInstance::new("done", NO_OP)).unwrap();
        graph
            .add_connection(Connection::new("start", 0, "fetch", 0))
            .unwrap();
        graph
            .add_connection(Connection::new("fetch", 0, "done", 0))
            .unwrap();
        graph
    }

    #[test]
    fn test_add_node_rejects_duplicate_id() {
        let mut graph = linear_graph();
        let err = graph
            .add_node(NodeInstance::new("fetch", NO_OP))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateId("fetch".to_string()));
        assert_eq!(graph.nodes.len(), 3);
    }

    #[test]
    fn test_add_connection_rejects_unknown_endpoint_but_not_bad_ports() {
        let mut graph = linear_graph();
        let err = graph
            .add_connection(Connection::new("start", 0, "ghost", 0))
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownEndpoint("ghost".to_string()));

        assert!(
            graph
                .add_connection(Connection::new("start", 7, "done", 3))
                .is_ok()
        );
    }

    #[test]
    fn test_reachable_from_triggers_skips_orphans() {
        let mut graph = linear_graph();
        graph.add_node(NodeInstance::new("orphan", NO_OP)).unwrap();

        let reachable = graph.reachable_from_triggers(NodeCatalog::builtin());
        let expected: BTreeSet<String> = ["start", "fetch", "done"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(reachable, expected);
    }

    #[test]
    fn test_detect_cycle_and_closing_connections() {
        let mut graph = linear_graph();
        assert!(!graph.detect_cycle());
        assert!(graph.closing_connections().is_empty());

        graph
            .add_connection(Connection::new("done", 0, "fetch", 0))
            .unwrap();
        assert!(graph.detect_cycle());
        assert_eq!(graph.closing_connections(), vec![2]);

        graph.connections.remove(2);
        assert!(!graph.detect_cycle());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut graph = linear_graph();
        graph
            .add_connection(Connection::new("done", 0, "done", 0))
            .unwrap();
        assert!(graph.detect_cycle());
        assert_eq!(graph.closing_connections(), vec![2]);
    }

    #[test]
    fn test_port_usage() {
        let mut graph = linear_graph();
        graph
            .add_connection(Connection::new("fetch", 1, "done", 0))
            .unwrap();
        let usage = graph.port_usage("fetch");
        assert_eq!(usage.inputs, 1);
        assert_eq!(usage.outputs, 2);
        assert_eq!(graph.port_usage("start").inputs, 0);
    }

    #[test]
    fn test_port_usage_saturates() {
        let graph = WorkflowGraph::from_parts(
            "Ports",
            "u1",
            vec![NodeInstance::new("a", NO_OP), NodeInstance::new("b", NO_OP)],
            vec![
                Connection::new("a", 2, "b", 0),
                Connection::new("a", usize::MAX, "b", usize::MAX),
            ],
        );
        assert_eq!(graph.port_usage("a").outputs, usize::MAX);
        assert_eq!(graph.port_usage("b").inputs, usize::MAX);
        assert_eq!(graph.port_usage("b").outputs, 0);
    }
}
