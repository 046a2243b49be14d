//! error.rs
//! Error taxonomy shared by the store, the engine and the document boundary.

use crate::store::NodeId;
use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The operation would break a node-type / connection invariant, or targets the Start node.
    #[error("Structural violation at node '{node}': {reason}")]
    StructuralViolation { node: NodeId, reason: String },
    #[error("Connection from '{source_node}' references unknown node '{target}'")]
    UnknownReference { source_node: NodeId, target: NodeId },
    #[error("Unknown node '{0}'")]
    UnknownNode(NodeId),
    #[error("Node '{node}' has no connection #{index}")]
    UnknownConnection { node: NodeId, index: usize },
    #[error("No slider value supplied for slider #{slider_index} (question '{node}')")]
    MissingSliderValue { node: NodeId, slider_index: usize },
    #[error("Slider #{slider_index} has value {value}, expected 0..=100")]
    SliderOutOfRange { slider_index: usize, value: u32 },
    #[error("Cycle detected involving node '{node}'")]
    CycleDetected { node: NodeId },
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GraphError {
    pub fn structural(node: &NodeId, reason: impl Into<String>) -> Self {
        GraphError::StructuralViolation { node: node.clone(), reason: reason.into() }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for GraphError {
    fn from(e: std::io::Error) -> Self {
        GraphError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for GraphError {
    fn from(e: toml::de::Error) -> Self {
        GraphError::Config(e.to_string())
    }
}
