//! The scenario graph: node model, type transitions, slider bookkeeping and the
//! mutation operations that tie them together.
pub mod registry;
pub mod reindex;
pub mod transitions;
pub mod types;

pub use registry::{ScenarioGraph, START_ID};
pub use types::{
    Connection, ConnectionKind, Connections, Direction, Node, NodeId, NodeKind, NodeType, OutcomeCategory, Point, Target,
};
