use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Stable string identity of a node. Survives reindexing and reordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

/// Side of a node's bounds a new connection leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionKind {
    #[serde(rename = "y")]
    Yes,
    #[serde(rename = "n")]
    No,
    #[serde(rename = "-")]
    Always,
}

/// Where a connection ends: another node, or a bare canvas point.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Node(NodeId),
    Floating(Point),
}

impl Target {
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Target::Node(id) => Some(id),
            Target::Floating(_) => None,
        }
    }

    pub fn is_floating(&self) -> bool { matches!(self, Target::Floating(_)) }
}

/// An outgoing edge, owned by its source node.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub target: Target,
    pub label: String,
}

impl Connection {
    pub fn floating(kind: ConnectionKind, at: Point) -> Self {
        Self { kind, target: Target::Floating(at), label: String::new() }
    }

    pub fn to_node(kind: ConnectionKind, target: NodeId) -> Self {
        Self { kind, target: Target::Node(target), label: String::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeCategory {
    Good,
    Ambivalent,
    Existential,
}

/// The node's type, with the per-type payload carried by the variant itself.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start,
    /// `probability` is the user-assigned conditional probability of the Yes branch, in percent.
    Question { slider_index: usize, probability: u8 },
    Intermediate,
    Outcome(OutcomeCategory),
}

/// Flat type tag, used where the caller names a type without its payload
/// (explicit retype requests, the document format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "s")]
    Start,
    #[serde(rename = "n")]
    Question,
    #[serde(rename = "i")]
    Intermediate,
    #[serde(rename = "g")]
    Good,
    #[serde(rename = "a")]
    Ambivalent,
    #[serde(rename = "e")]
    Existential,
}

impl NodeType {
    pub fn tag(&self) -> &'static str {
        match self {
            NodeType::Start => "s",
            NodeType::Question => "n",
            NodeType::Intermediate => "i",
            NodeType::Good => "g",
            NodeType::Ambivalent => "a",
            NodeType::Existential => "e",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "s" => Some(NodeType::Start),
            "n" => Some(NodeType::Question),
            "i" => Some(NodeType::Intermediate),
            "g" => Some(NodeType::Good),
            "a" => Some(NodeType::Ambivalent),
            "e" => Some(NodeType::Existential),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<OutcomeCategory> {
        match self {
            NodeType::Good => Some(OutcomeCategory::Good),
            NodeType::Ambivalent => Some(OutcomeCategory::Ambivalent),
            NodeType::Existential => Some(OutcomeCategory::Existential),
            _ => None,
        }
    }
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Start => NodeType::Start,
            NodeKind::Question { .. } => NodeType::Question,
            NodeKind::Intermediate => NodeType::Intermediate,
            NodeKind::Outcome(OutcomeCategory::Good) => NodeType::Good,
            NodeKind::Outcome(OutcomeCategory::Ambivalent) => NodeType::Ambivalent,
            NodeKind::Outcome(OutcomeCategory::Existential) => NodeType::Existential,
        }
    }

    pub fn slider_index(&self) -> Option<usize> {
        match self {
            NodeKind::Question { slider_index, .. } => Some(*slider_index),
            _ => None,
        }
    }

    pub fn probability(&self) -> Option<u8> {
        match self {
            NodeKind::Question { probability, .. } => Some(*probability),
            _ => None,
        }
    }

    pub fn is_question(&self) -> bool { matches!(self, NodeKind::Question { .. }) }
}

/// Connections rarely exceed two (a Question's Yes/No pair), so they stay inline.
pub type Connections = SmallVec<[Connection; 2]>;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub title: String,
    pub position: Point,
    pub connections: Connections,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, title: impl Into<String>, position: Point) -> Self {
        Self { id, kind, title: title.into(), position, connections: Connections::new() }
    }

    pub fn with_connections(mut self, connections: impl IntoIterator<Item = Connection>) -> Self {
        self.connections = connections.into_iter().collect();
        self
    }

    /// Node ids this node links to, skipping floating connections.
    pub fn linked_targets(&self) -> impl Iterator<Item = &NodeId> {
        self.connections.iter().filter_map(|c| c.target.node())
    }
}
