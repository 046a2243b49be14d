//! reindex.rs
//! Keeps Question slider indices dense: the set of indices is always `0..N`.

use super::types::{Node, NodeKind};

/// Index a newly created Question receives: one past the current maximum, or 0.
pub fn next_slider_index(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .filter_map(|n| n.kind.slider_index())
        .max()
        .map_or(0, |max| max + 1)
}

/// Closes the gap left by a Question that gave up slider index `removed`.
pub fn close_gap(nodes: &mut [Node], removed: usize) {
    for node in nodes.iter_mut() {
        if let NodeKind::Question { slider_index, .. } = &mut node.kind {
            if *slider_index > removed {
                *slider_index -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NodeId, Point};

    fn question(id: &str, slider_index: usize) -> Node {
        Node::new(NodeId::from(id), NodeKind::Question { slider_index, probability: 50 }, id, Point::default())
    }

    #[test]
    fn test_next_index_on_empty_is_zero() {
        let nodes = vec![Node::new(NodeId::from("s"), NodeKind::Start, "Start", Point::default())];
        assert_eq!(next_slider_index(&nodes), 0);
    }

    #[test]
    fn test_close_gap_shifts_only_higher_indices() {
        let mut nodes = vec![question("a", 0), question("b", 1), question("d", 3), question("e", 4)];
        close_gap(&mut nodes, 2);
        let got: Vec<_> = nodes.iter().map(|n| n.kind.slider_index().unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2, 3]);
        assert_eq!(next_slider_index(&nodes), 4);
    }
}
