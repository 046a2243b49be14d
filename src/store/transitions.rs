//! transitions.rs
//! The node-type state machine. Every change to a node's type or connection count
//! goes through here, so the type/arity invariants live in exactly one place:
//!
//! | type         | connections                 |
//! |--------------|-----------------------------|
//! | Start        | at most one, Always         |
//! | Question     | exactly two, Yes then No    |
//! | Intermediate | exactly one, Always         |
//! | Outcome      | none                        |

use super::reindex;
use super::types::{Connection, ConnectionKind, Direction, Node, NodeKind, NodeType, OutcomeCategory};
use crate::config::EditorConfig;
use crate::error::{GraphError, GraphResult};

/// Probability a node receives when it becomes a Question.
pub const DEFAULT_PROBABILITY: u8 = 50;
pub const YES_LABEL: &str = "Yes";
pub const NO_LABEL: &str = "No";

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionChange {
    Added(Connection),
    Removed(usize),
}

/// Applies a connection-count change to `nodes[idx]` and retypes the node to match.
pub fn apply_connection_change(nodes: &mut [Node], idx: usize, change: ConnectionChange) -> GraphResult<()> {
    let kind = nodes[idx].kind.clone();
    let count = nodes[idx].connections.len();

    match change {
        ConnectionChange::Added(mut conn) => match (&kind, count) {
            (NodeKind::Start, 0) => {
                conn.kind = ConnectionKind::Always;
                nodes[idx].connections.push(conn);
            }
            (NodeKind::Outcome(_), 0) => {
                conn.kind = ConnectionKind::Always;
                nodes[idx].connections.push(conn);
                nodes[idx].kind = NodeKind::Intermediate;
            }
            (NodeKind::Intermediate, 1) => {
                conn.kind = ConnectionKind::No;
                conn.label = NO_LABEL.to_string();
                let node = &mut nodes[idx];
                node.connections[0].kind = ConnectionKind::Yes;
                node.connections[0].label = YES_LABEL.to_string();
                node.connections.push(conn);
                become_question(nodes, idx);
            }
            (kind, n) => {
                return Err(GraphError::structural(
                    &nodes[idx].id,
                    format!("a {:?} node with {} connection(s) cannot take another", kind.node_type(), n),
                ))
            }
        },
        ConnectionChange::Removed(i) => {
            if i >= count {
                return Err(GraphError::UnknownConnection { node: nodes[idx].id.clone(), index: i });
            }
            match kind {
                NodeKind::Start => {
                    nodes[idx].connections.remove(i);
                }
                NodeKind::Question { .. } => {
                    nodes[idx].connections.remove(i);
                    for conn in nodes[idx].connections.iter_mut() {
                        conn.kind = ConnectionKind::Always;
                        conn.label.clear();
                    }
                    leave_question(nodes, idx, NodeKind::Intermediate);
                }
                NodeKind::Intermediate => {
                    nodes[idx].connections.remove(i);
                    nodes[idx].kind = NodeKind::Outcome(OutcomeCategory::Ambivalent);
                }
                // Outcomes have no connections, so the bounds check above already failed.
                NodeKind::Outcome(_) => unreachable!("outcome node with connections"),
            }
        }
    }
    Ok(())
}

/// Explicit, user-requested retype of `nodes[idx]`.
pub fn retype(nodes: &mut [Node], idx: usize, new_type: NodeType, config: &EditorConfig) -> GraphResult<()> {
    let node = &nodes[idx];
    if matches!(node.kind, NodeKind::Start) {
        return Err(GraphError::structural(&node.id, "the Start node cannot be retyped"));
    }
    if new_type == NodeType::Start {
        return Err(GraphError::structural(&node.id, "a graph has exactly one Start node"));
    }
    if node.kind.node_type() == new_type {
        return Ok(());
    }

    if new_type == NodeType::Question {
        synthesize_question_branches(&mut nodes[idx], config);
        become_question(nodes, idx);
        return Ok(());
    }

    let new_kind = match new_type.outcome() {
        Some(category) => NodeKind::Outcome(category),
        None => NodeKind::Intermediate,
    };
    if nodes[idx].kind.is_question() {
        for conn in nodes[idx].connections.iter_mut() {
            conn.kind = ConnectionKind::Always;
            conn.label.clear();
        }
        leave_question(nodes, idx, new_kind);
    } else {
        nodes[idx].kind = new_kind;
    }
    reconcile_arity(&mut nodes[idx], config);
    Ok(())
}

/// 0 connections: two new floating branches. 1: it becomes Yes, a No is added.
/// 2 or more: the first two become Yes/No, the rest are left alone.
fn synthesize_question_branches(node: &mut Node, config: &EditorConfig) {
    let yes_at = config.anchor_outside(node.position, Direction::Left);
    let no_at = config.anchor_outside(node.position, Direction::Right);
    if node.connections.is_empty() {
        node.connections.push(Connection::floating(ConnectionKind::Yes, yes_at));
    }
    if node.connections.len() == 1 {
        node.connections.push(Connection::floating(ConnectionKind::No, no_at));
    }
    node.connections[0].kind = ConnectionKind::Yes;
    node.connections[0].label = YES_LABEL.to_string();
    node.connections[1].kind = ConnectionKind::No;
    node.connections[1].label = NO_LABEL.to_string();
}

/// Brings the connection count in line with an Intermediate or Outcome node's arity.
fn reconcile_arity(node: &mut Node, config: &EditorConfig) {
    match node.kind {
        NodeKind::Intermediate => {
            if node.connections.is_empty() {
                let at = config.anchor_outside(node.position, Direction::Down);
                node.connections.push(Connection::floating(ConnectionKind::Always, at));
            } else if node.connections.len() > 1 {
                log::debug!("dropping {} surplus connection(s) of '{}'", node.connections.len() - 1, node.id);
                node.connections.truncate(1);
            }
        }
        NodeKind::Outcome(_) => {
            if !node.connections.is_empty() {
                log::debug!("dropping {} connection(s) of outcome '{}'", node.connections.len(), node.id);
                node.connections.clear();
            }
        }
        NodeKind::Start | NodeKind::Question { .. } => {}
    }
}

fn become_question(nodes: &mut [Node], idx: usize) {
    let slider_index = reindex::next_slider_index(nodes);
    nodes[idx].kind = NodeKind::Question { slider_index, probability: DEFAULT_PROBABILITY };
}

fn leave_question(nodes: &mut [Node], idx: usize, new_kind: NodeKind) {
    let old = std::mem::replace(&mut nodes[idx].kind, new_kind);
    if let Some(removed) = old.slider_index() {
        reindex::close_gap(nodes, removed);
    }
}
