//! validation.rs
//! Whole-graph invariant check. Runs after every mutation (on the working copy) and
//! on document load, collecting every violation rather than stopping at the first.

use crate::analysis::topology;
use crate::error::GraphError;
use crate::store::{ConnectionKind, Node, NodeId, NodeKind, Point, Target};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorType {
    /// Type / connection-count / slider bookkeeping mismatch.
    Structural,
    UnknownReference,
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub node_id: NodeId,
    pub error_type: ValidationErrorType,
    pub message: String,
}

impl ValidationError {
    fn structural(node_id: &NodeId, message: String) -> Self {
        Self { node_id: node_id.clone(), error_type: ValidationErrorType::Structural, message }
    }

    /// Folds a report into the error taxonomy used at the API boundary.
    pub fn into_graph_error(self) -> GraphError {
        match self.error_type {
            ValidationErrorType::Structural => GraphError::StructuralViolation { node: self.node_id, reason: self.message },
            ValidationErrorType::Cycle => GraphError::CycleDetected { node: self.node_id },
            // The message carries the dangling target id.
            ValidationErrorType::UnknownReference => GraphError::UnknownReference {
                source_node: self.node_id,
                target: NodeId::new(self.message),
            },
        }
    }
}

pub struct Validator<'a> {
    nodes: &'a [Node],
}

impl<'a> Validator<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        Self { nodes }
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        self.check_identity(&mut errors);
        for node in self.nodes {
            if let Some(err) = check_arity(node) {
                errors.push(err);
            }
            if let Some(err) = check_coordinates(node) {
                errors.push(err);
            }
            if let NodeKind::Question { probability, .. } = node.kind {
                if probability > 100 {
                    errors.push(ValidationError::structural(&node.id, format!("probability {} exceeds 100", probability)));
                }
            }
        }
        self.check_slider_indices(&mut errors);

        // Reachability is only meaningful once every link resolves.
        if errors.iter().all(|e| e.error_type != ValidationErrorType::UnknownReference) {
            if let Err(GraphError::CycleDetected { node }) = topology::sort(self.nodes) {
                errors.push(ValidationError {
                    node_id: node,
                    error_type: ValidationErrorType::Cycle,
                    message: "the connection graph contains a cycle".into(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn check_identity(&self, errors: &mut Vec<ValidationError>) {
        let mut seen = HashSet::new();
        for node in self.nodes {
            if !seen.insert(&node.id) {
                errors.push(ValidationError::structural(&node.id, "duplicate node id".into()));
            }
        }
        for node in self.nodes {
            for target in node.linked_targets() {
                if !seen.contains(target) {
                    errors.push(ValidationError {
                        node_id: node.id.clone(),
                        error_type: ValidationErrorType::UnknownReference,
                        message: target.to_string(),
                    });
                }
            }
        }

        let starts = self.nodes.iter().filter(|n| matches!(n.kind, NodeKind::Start)).count();
        if starts != 1 {
            let at = self.nodes.first().map(|n| n.id.clone()).unwrap_or_default();
            errors.push(ValidationError::structural(&at, format!("expected exactly one Start node, found {}", starts)));
        }
    }

    fn check_slider_indices(&self, errors: &mut Vec<ValidationError>) {
        let mut indices: Vec<(usize, &NodeId)> = self
            .nodes
            .iter()
            .filter_map(|n| n.kind.slider_index().map(|i| (i, &n.id)))
            .collect();
        indices.sort();
        for (expected, (got, id)) in indices.into_iter().enumerate() {
            if got != expected {
                errors.push(ValidationError::structural(
                    id,
                    format!("slider index {} breaks the contiguous range (expected {})", got, expected),
                ));
            }
        }
    }
}

/// NaN and infinities cannot be written to a document and read back.
fn check_coordinates(node: &Node) -> Option<ValidationError> {
    let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
    if !finite(&node.position) {
        return Some(ValidationError::structural(&node.id, format!("non-finite position {:?}", node.position)));
    }
    node.connections.iter().enumerate().find_map(|(i, c)| match &c.target {
        Target::Floating(p) if !finite(p) => Some(ValidationError::structural(
            &node.id,
            format!("connection #{} has non-finite endpoint {:?}", i, p),
        )),
        _ => None,
    })
}

fn check_arity(node: &Node) -> Option<ValidationError> {
    let kinds: Vec<ConnectionKind> = node.connections.iter().map(|c| c.kind).collect();
    let ok = match node.kind {
        NodeKind::Start => kinds.is_empty() || kinds == [ConnectionKind::Always],
        NodeKind::Question { .. } => kinds == [ConnectionKind::Yes, ConnectionKind::No],
        NodeKind::Intermediate => kinds == [ConnectionKind::Always],
        NodeKind::Outcome(_) => kinds.is_empty(),
    };
    if ok {
        None
    } else {
        Some(ValidationError::structural(
            &node.id,
            format!("a {:?} node cannot carry connections {:?}", node.kind.node_type(), kinds),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Connection, OutcomeCategory};

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

    fn outcome(id: &str) -> Node {
        Node::new(id.into(), NodeKind::Outcome(OutcomeCategory::Good), id, Point::default())
    }

    #[test]
    fn test_valid_graph_passes() {
        let nodes = vec![start("q"), question("q", 0, "g", "e"), outcome("g"), outcome("e")];
        assert!(Validator::new(&nodes).validate().is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let mut nodes = vec![start("q"), question("q", 1, "g", "ghost"), outcome("g")];
        nodes[2].connections.push(Connection::floating(ConnectionKind::Always, Point::default()));

        let errors = Validator::new(&nodes).validate().unwrap_err();
        let types: Vec<_> = errors.iter().map(|e| e.error_type.clone()).collect();
        assert!(types.contains(&ValidationErrorType::UnknownReference));
        assert_eq!(types.iter().filter(|t| **t == ValidationErrorType::Structural).count(), 2);
    }

    #[test]
    fn test_cycle_is_reported() {
        let a = question("a", 0, "b", "g");
        let b = Node::new("b".into(), NodeKind::Intermediate, "b", Point::default())
            .with_connections([Connection::to_node(ConnectionKind::Always, "a".into())]);
        let nodes = vec![start("a"), a, b, outcome("g")];

        let errors = Validator::new(&nodes).validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].clone().into_graph_error(), GraphError::CycleDetected { .. }));
    }

    #[test]
    fn test_non_finite_coordinates_are_structural() {
        let mut nodes = vec![start("q"), question("q", 0, "g", "e"), outcome("g"), outcome("e")];
        nodes[2].position = Point::new(f64::NAN, 0.0);
        nodes[3].position = Point::new(0.0, f64::INFINITY);
        let errors = Validator::new(&nodes).validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.error_type == ValidationErrorType::Structural));

        let mut nodes = vec![start("q"), question("q", 0, "g", "e"), outcome("g"), outcome("e")];
        nodes[0].connections[0].target = Target::Floating(Point::new(f64::NEG_INFINITY, 1.0));
        let errors = Validator::new(&nodes).validate().unwrap_err();
        assert_eq!(errors[0].node_id, NodeId::from("s"));
    }

    #[test]
    fn test_missing_start() {
        let nodes = vec![outcome("g")];
        let errors = Validator::new(&nodes).validate().unwrap_err();
        assert!(errors[0].message.contains("exactly one Start"));
    }
}
