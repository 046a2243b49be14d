//! engine.rs
//! Probability propagation over the scenario DAG.
//!
//! The probability of a node is the sum of the mass on its incoming edges; the mass on
//! an edge is its source's probability times the edge's conditional. The chosen root is
//! pinned to 1.0 regardless of what flows into it. Both quantities are resolved by
//! memoized mutual recursion, each node and edge exactly once.

use crate::compute::ledger::{EdgeProbability, ProbabilityLedger, SliderValues};
use crate::error::{GraphError, GraphResult};
use crate::store::{ConnectionKind, Node, NodeId, ScenarioGraph, Target};
use std::collections::HashMap;

/// Convenience entry point over a whole graph.
pub fn propagate(graph: &ScenarioGraph, sliders: &SliderValues, root: &NodeId) -> GraphResult<ProbabilityLedger> {
    ProbabilityEngine::new(graph.nodes()).propagate(sliders, root)
}

pub struct ProbabilityEngine<'a> {
    nodes: &'a [Node],
}

impl<'a> ProbabilityEngine<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        Self { nodes }
    }

    /// Computes the probability of every node and edge, given `root` is assumed reached.
    ///
    /// A transient preview root is just another call with a different `root`; nothing
    /// is cached between calls.
    pub fn propagate(&self, sliders: &SliderValues, root: &NodeId) -> GraphResult<ProbabilityLedger> {
        let mut run = Propagation::build(self.nodes, sliders, root)?;

        for n in 0..self.nodes.len() {
            run.node_probability(n)?;
        }
        for e in 0..run.edge_targets.len() {
            run.edge_probability(e)?;
        }
        Ok(run.into_ledger(root))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Pending,
    InProgress,
    Done(f64),
}

struct Propagation<'a> {
    nodes: &'a [Node],
    sliders: &'a SliderValues,
    root: usize,
    /// Reverse adjacency: for each node, the flat indices of edges targeting it.
    incoming: Vec<Vec<usize>>,
    edge_offsets: Vec<usize>,
    /// Per flat edge: (source node, connection index within source).
    edge_sources: Vec<(usize, usize)>,
    edge_targets: Vec<Option<usize>>,
    node_slots: Vec<Slot>,
    edge_slots: Vec<Slot>,
}

impl<'a> Propagation<'a> {
    fn build(nodes: &'a [Node], sliders: &'a SliderValues, root: &NodeId) -> GraphResult<Self> {
        let index: HashMap<&NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (&n.id, i)).collect();
        let &root_idx = index.get(root).ok_or_else(|| GraphError::UnknownNode(root.clone()))?;

        let mut incoming = vec![Vec::new(); nodes.len()];
        let mut edge_offsets = Vec::with_capacity(nodes.len());
        let mut edge_sources = Vec::new();
        let mut edge_targets = Vec::new();

        for (i, node) in nodes.iter().enumerate() {
            edge_offsets.push(edge_sources.len());
            for (j, conn) in node.connections.iter().enumerate() {
                let target = match &conn.target {
                    Target::Node(t) => {
                        let &t_idx = index.get(t).ok_or_else(|| GraphError::UnknownReference {
                            source_node: node.id.clone(),
                            target: t.clone(),
                        })?;
                        incoming[t_idx].push(edge_sources.len());
                        Some(t_idx)
                    }
                    Target::Floating(_) => None,
                };
                edge_sources.push((i, j));
                edge_targets.push(target);
            }
        }

        let edge_count = edge_sources.len();
        Ok(Self {
            nodes,
            sliders,
            root: root_idx,
            incoming,
            edge_offsets,
            edge_sources,
            edge_targets,
            node_slots: vec![Slot::Pending; nodes.len()],
            edge_slots: vec![Slot::Pending; edge_count],
        })
    }

    fn node_probability(&mut self, n: usize) -> GraphResult<f64> {
        match self.node_slots[n] {
            Slot::Done(p) => return Ok(p),
            Slot::InProgress => return Err(GraphError::CycleDetected { node: self.nodes[n].id.clone() }),
            Slot::Pending => self.node_slots[n] = Slot::InProgress,
        }

        // The root's incoming edges are still resolved so a cycle through it trips the marker.
        let mut sum = 0.0;
        for k in 0..self.incoming[n].len() {
            let e = self.incoming[n][k];
            sum += self.edge_probability(e)?;
        }
        let p = if n == self.root { 1.0 } else { sum };

        self.node_slots[n] = Slot::Done(p);
        Ok(p)
    }

    fn edge_probability(&mut self, e: usize) -> GraphResult<f64> {
        match self.edge_slots[e] {
            Slot::Done(p) => return Ok(p),
            Slot::InProgress => {
                let (source, _) = self.edge_sources[e];
                return Err(GraphError::CycleDetected { node: self.nodes[source].id.clone() });
            }
            Slot::Pending => self.edge_slots[e] = Slot::InProgress,
        }

        let (source, connection) = self.edge_sources[e];
        let p = self.node_probability(source)? * self.conditional(source, connection)?;
        self.edge_slots[e] = Slot::Done(p);
        Ok(p)
    }

    /// 1.0 for Always; the source's slider value for Yes; its complement for No.
    fn conditional(&self, source: usize, connection: usize) -> GraphResult<f64> {
        let node = &self.nodes[source];
        let kind = node.connections[connection].kind;
        if kind == ConnectionKind::Always {
            return Ok(1.0);
        }

        let slider_index = node.kind.slider_index().ok_or_else(|| {
            GraphError::structural(&node.id, format!("{:?} connection on a node without a slider", kind))
        })?;
        let percent = self
            .sliders
            .get(slider_index)
            .ok_or_else(|| GraphError::MissingSliderValue { node: node.id.clone(), slider_index })?;
        if percent > 100 {
            return Err(GraphError::SliderOutOfRange { slider_index, value: percent as u32 });
        }

        let yes = percent as f64 / 100.0;
        Ok(if kind == ConnectionKind::Yes { yes } else { 1.0 - yes })
    }

    fn into_ledger(self, root: &NodeId) -> ProbabilityLedger {
        let nodes = self.node_slots.iter().map(resolved).collect();
        let edges = self
            .edge_sources
            .iter()
            .zip(&self.edge_targets)
            .zip(&self.edge_slots)
            .map(|((&(source, connection), &target), slot)| EdgeProbability {
                source,
                connection,
                target,
                kind: self.nodes[source].connections[connection].kind,
                probability: resolved(slot),
            })
            .collect();

        ProbabilityLedger {
            root: root.clone(),
            ids: self.nodes.iter().map(|n| n.id.clone()).collect(),
            nodes,
            edges,
            edge_offsets: self.edge_offsets,
        }
    }
}

fn resolved(slot: &Slot) -> f64 {
    match slot {
        Slot::Done(p) => *p,
        // Both passes completed without error, so every slot is resolved.
        Slot::Pending | Slot::InProgress => unreachable!("unresolved slot after a full pass"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Connection, NodeKind, OutcomeCategory, Point};
    use rstest::rstest;

    const EPS: f64 = 1e-12;

    fn start(to: &str) -> Node {
        Node::new("s".into(), NodeKind::Start, "Start", Point::default())
            .with_connections([Connection::to_node(ConnectionKind::Always, to.into())])
    }

    fn question(id: &str, slider_index: usize, yes: &str, no: &str) -> Node {
        Node::new(id.into(), NodeKind::Question { slider_index, probability: 50 }, id, Point::default())
            .with_connections([
                Connection::to_node(ConnectionKind::Yes, yes.into()),
                Connection::to_node(ConnectionKind::No, no.into()),
            ])
    }

    fn intermediate(id: &str, to: &str) -> Node {
        Node::new(id.into(), NodeKind::Intermediate, id, Point::default())
            .with_connections([Connection::to_node(ConnectionKind::Always, to.into())])
    }

    fn outcome(id: &str, category: OutcomeCategory) -> Node {
        Node::new(id.into(), NodeKind::Outcome(category), id, Point::default())
    }

    fn sliders(values: &[u8]) -> SliderValues {
        values.iter().copied().enumerate().collect()
    }

    /// s -> q0(Yes: i, No: q1); i -> q1; q1(Yes: g, No: e). q1 is a join point.
    fn diamond() -> Vec<Node> {
        vec![
            start("q0"),
            question("q0", 0, "i", "q1"),
            intermediate("i", "q1"),
            question("q1", 1, "g", "e"),
            outcome("g", OutcomeCategory::Good),
            outcome("e", OutcomeCategory::Existential),
        ]
    }

    #[test]
    fn test_scenario_a() {
        let nodes = vec![
            start("q"),
            question("q", 0, "g", "e"),
            outcome("g", OutcomeCategory::Good),
            outcome("e", OutcomeCategory::Existential),
        ];
        let ledger = ProbabilityEngine::new(&nodes).propagate(&sliders(&[70]), &"s".into()).unwrap();

        assert!((ledger.node(1) - 1.0).abs() < EPS);
        assert!((ledger.edge(1, 0).unwrap().probability - 0.70).abs() < EPS);
        assert!((ledger.edge(1, 1).unwrap().probability - 0.30).abs() < EPS);
        assert!((ledger.get(&"g".into()).unwrap() - 0.70).abs() < EPS);
        assert!((ledger.get(&"e".into()).unwrap() - 0.30).abs() < EPS);
    }

    #[test]
    fn test_join_point_sums_contributions() {
        let nodes = diamond();
        let ledger = ProbabilityEngine::new(&nodes).propagate(&sliders(&[40, 25]), &"s".into()).unwrap();
        // q1 is reached via Yes->i->q1 (0.4) and directly via No (0.6).
        assert!((ledger.get(&"q1".into()).unwrap() - 1.0).abs() < EPS);
        assert!((ledger.get(&"i".into()).unwrap() - 0.4).abs() < EPS);
        assert!((ledger.get(&"g".into()).unwrap() - 0.25).abs() < EPS);
        assert!((ledger.get(&"e".into()).unwrap() - 0.75).abs() < EPS);
    }

    #[rstest]
    #[case("s")]
    #[case("q0")]
    #[case("i")]
    #[case("q1")]
    #[case("g")]
    fn test_root_is_pinned(#[case] root: &str) {
        let nodes = diamond();
        let ledger = ProbabilityEngine::new(&nodes).propagate(&sliders(&[40, 25]), &root.into()).unwrap();
        assert_eq!(ledger.get(&root.into()), Some(1.0));
    }

    #[test]
    fn test_rerooting_is_conditional_reachability() {
        let nodes = diamond();
        let ledger = ProbabilityEngine::new(&nodes).propagate(&sliders(&[40, 25]), &"i".into()).unwrap();
        // Nothing upstream of the root receives mass.
        assert_eq!(ledger.get(&"s".into()), Some(0.0));
        assert_eq!(ledger.get(&"q0".into()), Some(0.0));
        assert!((ledger.get(&"q1".into()).unwrap() - 1.0).abs() < EPS);
        assert!((ledger.get(&"g".into()).unwrap() - 0.25).abs() < EPS);
    }

    #[rstest]
    #[case(&[0, 0])]
    #[case(&[100, 100])]
    #[case(&[33, 67])]
    #[case(&[1, 99])]
    fn test_outgoing_mass_is_conserved(#[case] values: &[u8]) {
        let nodes = diamond();
        let ledger = ProbabilityEngine::new(&nodes).propagate(&sliders(values), &"s".into()).unwrap();
        for (i, node) in nodes.iter().enumerate() {
            if node.connections.is_empty() {
                continue;
            }
            let out: f64 = ledger.edges_from(i).iter().map(|e| e.probability).sum();
            assert!((out - ledger.node(i)).abs() < EPS, "node {} leaks mass", node.id);
        }
    }

    #[test]
    fn test_raising_slider_moves_mass_to_yes() {
        let nodes = diamond();
        let engine = ProbabilityEngine::new(&nodes);
        let mut last: Option<(f64, f64)> = None;
        for v in [0u8, 10, 50, 51, 90, 100] {
            let ledger = engine.propagate(&sliders(&[v, 50]), &"s".into()).unwrap();
            let yes = ledger.edge(1, 0).unwrap().probability;
            let no = ledger.edge(1, 1).unwrap().probability;
            if let Some((prev_yes, prev_no)) = last {
                assert!(yes > prev_yes);
                assert!(no < prev_no);
            }
            last = Some((yes, no));
        }
    }

    #[test]
    fn test_unreachable_node_has_zero_mass() {
        let mut nodes = diamond();
        nodes.push(intermediate("orphan", "g"));
        let ledger = ProbabilityEngine::new(&nodes).propagate(&sliders(&[40, 25]), &"s".into()).unwrap();
        assert_eq!(ledger.get(&"orphan".into()), Some(0.0));
        assert_eq!(ledger.edge(6, 0).unwrap().probability, 0.0);
        assert!((ledger.get(&"g".into()).unwrap() - 0.25).abs() < EPS);
    }

    #[test]
    fn test_floating_edges_carry_mass_but_no_target() {
        let mut nodes = vec![start("x")];
        nodes[0].connections[0].target = Target::Floating(Point::new(1.0, 1.0));
        let ledger = ProbabilityEngine::new(&nodes).propagate(&SliderValues::new(), &"s".into()).unwrap();
        let e = ledger.edge(0, 0).unwrap();
        assert_eq!(e.target, None);
        assert_eq!(e.probability, 1.0);
    }

    #[test]
    fn test_missing_slider_value() {
        let nodes = diamond();
        let err = ProbabilityEngine::new(&nodes).propagate(&sliders(&[40]), &"s".into()).unwrap_err();
        assert_eq!(err, GraphError::MissingSliderValue { node: "q1".into(), slider_index: 1 });
    }

    #[test]
    fn test_slider_out_of_range() {
        let nodes = diamond();
        let err = ProbabilityEngine::new(&nodes).propagate(&sliders(&[40, 150]), &"s".into()).unwrap_err();
        assert_eq!(err, GraphError::SliderOutOfRange { slider_index: 1, value: 150 });
    }

    #[test]
    fn test_unknown_root_and_reference() {
        let nodes = diamond();
        let err = ProbabilityEngine::new(&nodes).propagate(&sliders(&[1, 1]), &"nope".into()).unwrap_err();
        assert_eq!(err, GraphError::UnknownNode("nope".into()));

        let nodes = vec![start("ghost")];
        let err = ProbabilityEngine::new(&nodes).propagate(&SliderValues::new(), &"s".into()).unwrap_err();
        assert_eq!(err, GraphError::UnknownReference { source_node: "s".into(), target: "ghost".into() });
    }

    #[test]
    fn test_cycle_is_detected_not_recursed() {
        // a -> b -> a, reached from the start: the guard must trip instead of overflowing.
        let nodes = vec![start("a"), intermediate("a", "b"), intermediate("b", "a")];
        let err = ProbabilityEngine::new(&nodes).propagate(&SliderValues::new(), &"s".into()).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
    }

    #[rstest]
    #[case("s")]
    #[case("a")]
    #[case("b")]
    fn test_cycle_is_detected_from_any_root(#[case] root: &str) {
        let nodes = vec![start("a"), intermediate("a", "b"), intermediate("b", "a")];
        let err = ProbabilityEngine::new(&nodes).propagate(&SliderValues::new(), &root.into()).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
    }
}
