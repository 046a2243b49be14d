//! registry.rs
//! The canonical node list and its atomic mutation operations.
//!
//! Every mutation runs against a working copy, is checked by the `Validator`, and
//! only then replaces the live node list. A failed operation leaves the graph untouched.

use super::reindex;
use super::transitions::{self, ConnectionChange};
use super::types::*;
use crate::analysis::topology;
use crate::analysis::validation::Validator;
use crate::compute::SliderValues;
use crate::config::EditorConfig;
use crate::error::{GraphError, GraphResult};

pub const START_ID: &str = "start";

#[derive(Debug, Clone)]
pub struct ScenarioGraph {
    nodes: Vec<Node>,
    config: EditorConfig,
    id_counter: u64,
}

impl Default for ScenarioGraph {
    fn default() -> Self { Self::with_config(EditorConfig::default()) }
}

impl ScenarioGraph {
    /// A fresh document: a Start node with one floating Always connection.
    pub fn new() -> Self { Self::default() }

    pub fn with_config(config: EditorConfig) -> Self {
        let position = Point::new(0.0, 0.0);
        let anchor = config.anchor_outside(position, Direction::Down);
        let start = Node::new(NodeId::from(START_ID), NodeKind::Start, "Start", position)
            .with_connections([Connection::floating(ConnectionKind::Always, anchor)]);
        Self { nodes: vec![start], config, id_counter: 0 }
    }

    /// Adopts an externally built node list after checking every invariant.
    pub fn from_nodes(nodes: Vec<Node>, config: EditorConfig) -> GraphResult<Self> {
        Validator::new(&nodes).validate().map_err(|mut errors| errors.swap_remove(0).into_graph_error())?;
        log::debug!("adopted graph with {} node(s)", nodes.len());
        Ok(Self { nodes, config, id_counter: 0 })
    }

    // --- Accessors ---
    pub fn nodes(&self) -> &[Node] { &self.nodes }
    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }
    pub fn config(&self) -> &EditorConfig { &self.config }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn start_id(&self) -> &NodeId {
        self.nodes
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Start))
            .map(|n| &n.id)
            .unwrap_or_else(|| unreachable!("validated graphs always hold a Start node"))
    }

    /// Current conditional probabilities keyed by slider index.
    pub fn slider_values(&self) -> SliderValues {
        self.nodes
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Question { slider_index, probability } => Some((slider_index, probability)),
                _ => None,
            })
            .collect()
    }

    /// Topmost node whose bounds contain `p` (later nodes draw above earlier ones).
    pub fn node_at(&self, p: Point) -> Option<&NodeId> {
        self.nodes.iter().rev().find(|n| self.config.contains(n.position, p)).map(|n| &n.id)
    }

    // --- Mutations ---

    pub fn add_node(&mut self, position: Point) -> GraphResult<NodeId> {
        let id = self.fresh_id();
        let anchor = Point::new(
            position.x + self.config.node_width / 2.0,
            position.y + self.config.node_height + self.config.new_node_offset,
        );
        let node = Node::new(id.clone(), NodeKind::Intermediate, "", position)
            .with_connections([Connection::floating(ConnectionKind::Always, anchor)]);
        self.commit("add_node", |nodes, _| {
            nodes.push(node);
            Ok(())
        })?;
        log::debug!("added intermediate node '{}'", id);
        Ok(id)
    }

    pub fn delete_node(&mut self, id: &NodeId) -> GraphResult<()> {
        self.commit("delete_node", |nodes, _| {
            let idx = locate(nodes, id)?;
            if matches!(nodes[idx].kind, NodeKind::Start) {
                return Err(GraphError::structural(id, "the Start node cannot be deleted"));
            }
            let removed = nodes.remove(idx);

            // Incoming links fall back to floating endpoints where the node used to be.
            for node in nodes.iter_mut() {
                for conn in node.connections.iter_mut() {
                    if conn.target.node() == Some(id) {
                        conn.target = Target::Floating(removed.position);
                    }
                }
            }
            if let Some(slider_index) = removed.kind.slider_index() {
                reindex::close_gap(nodes, slider_index);
            }
            Ok(())
        })?;
        log::debug!("deleted node '{}'", id);
        Ok(())
    }

    pub fn add_connection(&mut self, id: &NodeId, direction: Direction) -> GraphResult<()> {
        self.commit("add_connection", |nodes, config| {
            let idx = locate(nodes, id)?;
            let at = config.anchor_outside(nodes[idx].position, direction);
            transitions::apply_connection_change(nodes, idx, ConnectionChange::Added(Connection::floating(ConnectionKind::Always, at)))
        })?;
        self.log_type(id, "add_connection");
        Ok(())
    }

    pub fn delete_connection(&mut self, id: &NodeId, connection: usize) -> GraphResult<()> {
        self.commit("delete_connection", |nodes, _| {
            let idx = locate(nodes, id)?;
            transitions::apply_connection_change(nodes, idx, ConnectionChange::Removed(connection))
        })?;
        self.log_type(id, "delete_connection");
        Ok(())
    }

    /// Points an existing connection at a node or a canvas point. Linking to a node that
    /// already reaches `id` is refused with `CycleDetected`.
    pub fn reconnect_connection(&mut self, id: &NodeId, connection: usize, new_target: Target) -> GraphResult<()> {
        self.commit("reconnect_connection", |nodes, _| {
            let idx = locate(nodes, id)?;
            if let Target::Node(target) = &new_target {
                locate(nodes, target)?;
                if topology::would_create_cycle(nodes, id, target) {
                    return Err(GraphError::CycleDetected { node: target.clone() });
                }
            }
            connection_mut(&mut nodes[idx], connection)?.target = new_target;
            Ok(())
        })
    }

    /// Drag-release helper: links when the guard allows it, otherwise leaves the endpoint
    /// floating, pushed clear of the node it was dropped on. Returns whether it linked.
    pub fn attach_or_float(&mut self, id: &NodeId, connection: usize, target: &NodeId, drop_point: Point) -> GraphResult<bool> {
        let target_position = self.node(target).ok_or_else(|| GraphError::UnknownNode(target.clone()))?.position;
        if topology::would_create_cycle(&self.nodes, id, target) {
            log::debug!("'{}' -> '{}' would close a cycle; leaving endpoint floating", id, target);
            let displaced = self.config.displace_from(target_position, drop_point);
            self.reconnect_connection(id, connection, Target::Floating(displaced))?;
            return Ok(false);
        }
        self.reconnect_connection(id, connection, Target::Node(target.clone()))?;
        Ok(true)
    }

    pub fn update_connection_label(&mut self, id: &NodeId, connection: usize, text: impl Into<String>) -> GraphResult<()> {
        let text = text.into();
        self.commit("update_connection_label", |nodes, _| {
            let idx = locate(nodes, id)?;
            connection_mut(&mut nodes[idx], connection)?.label = text;
            Ok(())
        })
    }

    pub fn change_node_type(&mut self, id: &NodeId, new_type: NodeType) -> GraphResult<()> {
        self.commit("change_node_type", |nodes, config| {
            let idx = locate(nodes, id)?;
            transitions::retype(nodes, idx, new_type, config)
        })?;
        self.log_type(id, "change_node_type");
        Ok(())
    }

    /// Drops a new Ambivalent outcome at a floating endpoint and links the connection to it.
    pub fn create_node_from_floating_target(&mut self, id: &NodeId, connection: usize) -> GraphResult<NodeId> {
        let new_id = self.fresh_id();
        self.commit("create_node_from_floating_target", |nodes, config| {
            let idx = locate(nodes, id)?;
            let conn = connection_mut(&mut nodes[idx], connection)?;
            let Target::Floating(at) = conn.target else {
                return Err(GraphError::structural(id, format!("connection #{} is already linked", connection)));
            };
            conn.target = Target::Node(new_id.clone());
            let position = Point::new(at.x - config.node_width / 2.0, at.y);
            nodes.push(Node::new(new_id.clone(), NodeKind::Outcome(OutcomeCategory::Ambivalent), "", position));
            Ok(())
        })?;
        log::debug!("created outcome '{}' under '{}' #{}", new_id, id, connection);
        Ok(new_id)
    }

    pub fn set_probability(&mut self, id: &NodeId, percent: u8) -> GraphResult<()> {
        if percent > 100 {
            return Err(GraphError::structural(id, format!("probability {} exceeds 100", percent)));
        }
        self.commit("set_probability", |nodes, _| {
            let idx = locate(nodes, id)?;
            match &mut nodes[idx].kind {
                NodeKind::Question { probability, .. } => {
                    *probability = percent;
                    Ok(())
                }
                _ => Err(GraphError::structural(id, "only Question nodes carry a probability")),
            }
        })
    }

    pub fn set_title(&mut self, id: &NodeId, title: impl Into<String>) -> GraphResult<()> {
        let title = title.into();
        self.commit("set_title", |nodes, _| {
            let idx = locate(nodes, id)?;
            nodes[idx].title = title;
            Ok(())
        })
    }

    pub fn move_node(&mut self, id: &NodeId, position: Point) -> GraphResult<()> {
        self.commit("move_node", |nodes, _| {
            let idx = locate(nodes, id)?;
            nodes[idx].position = position;
            Ok(())
        })
    }

    // --- Internals ---

    fn commit<T>(&mut self, op: &str, f: impl FnOnce(&mut Vec<Node>, &EditorConfig) -> GraphResult<T>) -> GraphResult<T> {
        let mut working = self.nodes.clone();
        let out = f(&mut working, &self.config).inspect_err(|e| log::warn!("{} refused: {}", op, e))?;

        if let Err(mut errors) = Validator::new(&working).validate() {
            log::warn!("{} refused: {} invariant violation(s), first: {}", op, errors.len(), errors[0].message);
            return Err(errors.swap_remove(0).into_graph_error());
        }
        self.nodes = working;
        Ok(out)
    }

    /// Generates an id not yet used by any node.
    fn fresh_id(&mut self) -> NodeId {
        loop {
            self.id_counter += 1;
            let candidate = NodeId(format!("node_{}", self.id_counter));
            if self.node(&candidate).is_none() {
                return candidate;
            }
        }
    }

    fn log_type(&self, id: &NodeId, op: &str) {
        if let Some(node) = self.node(id) {
            log::debug!("{}: '{}' is now {:?} with {} connection(s)", op, id, node.kind.node_type(), node.connections.len());
        }
    }
}

fn locate(nodes: &[Node], id: &NodeId) -> GraphResult<usize> {
    nodes.iter().position(|n| &n.id == id).ok_or_else(|| GraphError::UnknownNode(id.clone()))
}

fn connection_mut(node: &mut Node, index: usize) -> GraphResult<&mut Connection> {
    let id = node.id.clone();
    node.connections.get_mut(index).ok_or(GraphError::UnknownConnection { node: id, index })
}
