use crate::error::{GraphError, GraphResult};
use crate::store::{Node, NodeId};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, VecDeque};

/// Maps node ids to their position in the node list.
pub fn index_map(nodes: &[Node]) -> HashMap<&NodeId, usize> {
    nodes.iter().enumerate().map(|(i, n)| (&n.id, i)).collect()
}

/// Breadth-first search along linked connections. Floating connections and links to
/// unknown ids are ignored.
pub fn path_exists(nodes: &[Node], from: &NodeId, to: &NodeId) -> bool {
    let index = index_map(nodes);
    let Some(&start) = index.get(from) else { return false };

    let mut visited = vec![false; nodes.len()];
    let mut queue = VecDeque::from([start]);
    while let Some(i) = queue.pop_front() {
        if &nodes[i].id == to {
            return true;
        }
        if std::mem::replace(&mut visited[i], true) {
            continue;
        }
        for target in nodes[i].linked_targets() {
            if let Some(&next) = index.get(target) {
                if !visited[next] {
                    queue.push_back(next);
                }
            }
        }
    }
    false
}

/// The reconnect guard: linking `source -> target` closes a cycle iff `target`
/// already reaches `source` (a self-link is the degenerate case).
pub fn would_create_cycle(nodes: &[Node], source: &NodeId, target: &NodeId) -> bool {
    source == target || path_exists(nodes, target, source)
}

/// Returns the node ids in an order where every link's source precedes its target.
///
/// Dangling links are reported as `UnknownReference`; a cycle as `CycleDetected`,
/// naming one node on it. Used to validate documents that did not come through the
/// editor's reconnect guard.
pub fn sort(nodes: &[Node]) -> GraphResult<Vec<NodeId>> {
    let index = index_map(nodes);
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(nodes.len(), nodes.len());
    let handles: Vec<NodeIndex> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();

    for (i, node) in nodes.iter().enumerate() {
        for target in node.linked_targets() {
            let &j = index.get(target).ok_or_else(|| GraphError::UnknownReference {
                source_node: node.id.clone(),
                target: target.clone(),
            })?;
            graph.add_edge(handles[i], handles[j], ());
        }
    }

    toposort(&graph, None)
        .map(|order| order.into_iter().map(|h| nodes[graph[h]].id.clone()).collect())
        .map_err(|cycle| GraphError::CycleDetected { node: nodes[graph[cycle.node_id()]].id.clone() })
}
