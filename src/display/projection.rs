//! projection.rs
//! Flattens a graph plus its probability ledger into the shape the renderer consumes.

use crate::compute::ProbabilityLedger;
use crate::error::{GraphError, GraphResult};
use crate::store::{ConnectionKind, NodeType, ScenarioGraph, Target};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedNode {
    pub index: usize,
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub p: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedEdge {
    pub source: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<usize>,
    pub kind: ConnectionKind,
    pub p: f64,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub nodes: Vec<ProjectedNode>,
    pub edges: Vec<ProjectedEdge>,
}

impl Projection {
    pub fn to_json(&self) -> GraphResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Pairs every node and connection with its probability. The ledger must have been
/// computed from this exact graph.
pub fn project(graph: &ScenarioGraph, ledger: &ProbabilityLedger) -> GraphResult<Projection> {
    let nodes = graph.nodes();
    let stale = ledger.ids.len() != nodes.len() || ledger.ids.iter().zip(nodes).any(|(id, n)| id != &n.id);
    if stale {
        return Err(GraphError::InvalidDocument("probability ledger does not match the graph".into()));
    }

    let projected_nodes = nodes
        .iter()
        .enumerate()
        .map(|(index, n)| ProjectedNode {
            index,
            id: n.id.0.clone(),
            node_type: n.kind.node_type(),
            x: n.position.x,
            y: n.position.y,
            text: n.title.clone(),
            p: ledger.node(index),
        })
        .collect();

    let edges = ledger
        .edges()
        .iter()
        .map(|e| {
            let conn = &nodes[e.source].connections[e.connection];
            let (target_x, target_y) = match conn.target {
                Target::Floating(p) => (Some(p.x), Some(p.y)),
                Target::Node(_) => (None, None),
            };
            ProjectedEdge {
                source: e.source,
                target: e.target,
                kind: e.kind,
                p: e.probability,
                label: conn.label.clone(),
                target_x,
                target_y,
            }
        })
        .collect();

    Ok(Projection { nodes: projected_nodes, edges })
}
