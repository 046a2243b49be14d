use crate::compute::ProbabilityLedger;
use crate::store::{ConnectionKind, NodeId, NodeKind, ScenarioGraph};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders how probability mass reaches `target`: each node followed by the edges
/// feeding it, recursively up to the root.
pub fn format_trace(graph: &ScenarioGraph, ledger: &ProbabilityLedger, target: &NodeId) -> String {
    let mut tracer = Tracer {
        graph,
        ledger,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    match graph.nodes().iter().position(|n| &n.id == target) {
        Some(idx) if idx < ledger.node_probabilities().len() => {
            let _ = writeln!(tracer.output, "PROBABILITY TRACE for node '{}' (root '{}'):", label_of(graph, idx), ledger.root);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_node(idx, 1, "");
        }
        _ => {
            let _ = writeln!(tracer.output, "Error: Invalid Node ID {}", target);
        }
    }
    tracer.output
}

fn label_of(graph: &ScenarioGraph, idx: usize) -> String {
    let node = &graph.nodes()[idx];
    if node.title.is_empty() {
        node.id.to_string()
    } else {
        node.title.clone()
    }
}

struct Tracer<'a> {
    graph: &'a ScenarioGraph,
    ledger: &'a ProbabilityLedger,
    visited_at_level: HashMap<usize, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, idx: usize, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&idx) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(idx, level);

        let node = &self.graph.nodes()[idx];
        let header = format!("[L{}] {} [{:.3}]", level, label_of(self.graph, idx), self.ledger.node(idx));
        let detail = match node.kind {
            NodeKind::Question { slider_index, probability } => format!(" Question #{} @ {}%", slider_index, probability),
            _ => format!(" {:?}", node.kind.node_type()),
        };

        if node.id == self.ledger.root {
            let _ = writeln!(self.output, "{}{}{} [ROOT]", prefix, header, detail);
            return;
        }

        let incoming: Vec<_> = self.ledger.edges_into(idx).cloned().collect();
        if incoming.is_empty() {
            let _ = writeln!(self.output, "{}{}{} [UNREACHED]", prefix, header, detail);
            return;
        }
        let _ = writeln!(self.output, "{}{}{}", prefix, header, detail);

        let stem = build_child_stem(prefix);
        for (i, edge) in incoming.iter().enumerate() {
            let is_last = i == incoming.len() - 1;
            let connector = if is_last { "`--" } else { "|--" };
            let branch = match edge.kind {
                ConnectionKind::Yes => "Yes",
                ConnectionKind::No => "No",
                ConnectionKind::Always => "Always",
            };
            let _ = writeln!(self.output, "{}{} {} [{:.3}] from:", stem, connector, branch, edge.probability);

            let inner = if is_last { "    " } else { "|   " };
            let child_prefix = format!("{}{}`-- ", stem, inner);
            self.trace_node(edge.source, level + 1, &child_prefix);
        }
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`-- ", "    ").replace("|-- ", "|   ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::propagate;
    use crate::store::{Direction, Point, Target};

    #[test]
    fn test_trace_walks_back_to_root() {
        let mut g = ScenarioGraph::new();
        let start = g.start_id().clone();
        let q = g.add_node(Point::new(0.0, 200.0)).unwrap();
        g.add_connection(&q, Direction::Right).unwrap();
        g.set_title(&q, "Rain?").unwrap();
        g.set_probability(&q, 70).unwrap();
        g.reconnect_connection(&start, 0, Target::Node(q.clone())).unwrap();
        let wet = g.create_node_from_floating_target(&q, 0).unwrap();
        g.set_title(&wet, "Wet").unwrap();

        let ledger = propagate(&g, &g.slider_values(), &start).unwrap();
        let out = format_trace(&g, &ledger, &wet);

        assert!(out.starts_with("PROBABILITY TRACE for node 'Wet' (root 'start'):"));
        assert!(out.contains("[L1] Wet [0.700] Ambivalent"));
        assert!(out.contains("Yes [0.700] from:"));
        assert!(out.contains("[L2] Rain? [1.000] Question #0 @ 70%"));
        assert!(out.contains("[L3] Start [1.000] Start [ROOT]"));
    }

    #[test]
    fn test_trace_marks_unreached_and_unknown() {
        let mut g = ScenarioGraph::new();
        let lonely = g.add_node(Point::new(400.0, 400.0)).unwrap();
        let ledger = propagate(&g, &g.slider_values(), &g.start_id().clone()).unwrap();

        assert!(format_trace(&g, &ledger, &lonely).contains("[UNREACHED]"));
        assert!(format_trace(&g, &ledger, &"ghost".into()).contains("Invalid Node ID ghost"));
    }
}
