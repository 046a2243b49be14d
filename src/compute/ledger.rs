//! ledger.rs
//! Inputs and outputs of a propagation run.

use crate::store::{ConnectionKind, NodeId};
use std::collections::BTreeMap;

/// Conditional probabilities (percent, 0..=100) keyed by slider index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliderValues(BTreeMap<usize, u8>);

impl SliderValues {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, slider_index: usize, percent: u8) -> Option<u8> {
        self.0.insert(slider_index, percent)
    }

    pub fn get(&self, slider_index: usize) -> Option<u8> {
        self.0.get(&slider_index).copied()
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl FromIterator<(usize, u8)> for SliderValues {
    fn from_iter<I: IntoIterator<Item = (usize, u8)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Later values win, so extending the stored sliders with a partial map overrides
/// only the indices it names.
impl Extend<(usize, u8)> for SliderValues {
    fn extend<I: IntoIterator<Item = (usize, u8)>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

/// Probability mass flowing through one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeProbability {
    /// Position of the source node in the graph's node list.
    pub source: usize,
    /// Position of the connection within the source's connection list.
    pub connection: usize,
    /// Position of the target node; `None` for a floating endpoint.
    pub target: Option<usize>,
    pub kind: ConnectionKind,
    pub probability: f64,
}

/// Derived, read-only result of one propagation. Indexed like the node list it was
/// computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityLedger {
    pub root: NodeId,
    pub(crate) ids: Vec<NodeId>,
    pub(crate) nodes: Vec<f64>,
    pub(crate) edges: Vec<EdgeProbability>,
    /// `edge_offsets[i]` is the first entry of node `i`'s edges in `edges`.
    pub(crate) edge_offsets: Vec<usize>,
}

impl ProbabilityLedger {
    #[inline(always)]
    pub fn node(&self, index: usize) -> f64 { self.nodes[index] }

    pub fn node_probabilities(&self) -> &[f64] { &self.nodes }

    pub fn get(&self, id: &NodeId) -> Option<f64> {
        self.ids.iter().position(|x| x == id).map(|i| self.nodes[i])
    }

    pub fn edges(&self) -> &[EdgeProbability] { &self.edges }

    pub fn edges_from(&self, source: usize) -> &[EdgeProbability] {
        let start = self.edge_offsets[source];
        let end = self.edge_offsets.get(source + 1).copied().unwrap_or(self.edges.len());
        &self.edges[start..end]
    }

    pub fn edge(&self, source: usize, connection: usize) -> Option<&EdgeProbability> {
        self.edges_from(source).get(connection)
    }

    /// Edges whose target is node `index`.
    pub fn edges_into(&self, index: usize) -> impl Iterator<Item = &EdgeProbability> {
        self.edges.iter().filter(move |e| e.target == Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::propagate;
    use crate::store::{Direction, Point, ScenarioGraph, Target};

    #[test]
    fn test_partial_override_keeps_stored_values() {
        // start -> q0 -(Yes)-> q1; both questions stored at 50%.
        let mut g = ScenarioGraph::new();
        let start = g.start_id().clone();
        let q0 = g.add_node(Point::new(0.0, 200.0)).unwrap();
        g.add_connection(&q0, Direction::Right).unwrap();
        let q1 = g.add_node(Point::new(0.0, 400.0)).unwrap();
        g.add_connection(&q1, Direction::Right).unwrap();
        g.reconnect_connection(&start, 0, Target::Node(q0.clone())).unwrap();
        g.reconnect_connection(&q0, 0, Target::Node(q1.clone())).unwrap();

        let mut values = g.slider_values();
        values.extend([(1, 20)]);
        assert_eq!(values.get(0), Some(50));
        assert_eq!(values.get(1), Some(20));

        let ledger = propagate(&g, &values, &start).unwrap();
        let q1_idx = g.nodes().iter().position(|n| n.id == q1).unwrap();
        assert!((ledger.edge(q1_idx, 0).unwrap().probability - 0.5 * 0.2).abs() < 1e-12);
    }
}
