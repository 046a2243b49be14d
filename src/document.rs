//! document.rs
//! The persisted graph document and its conversion to and from `ScenarioGraph`.
//!
//! Persistence itself belongs to the caller; this module only owns the format. A
//! document is fully validated on the way in (dangling references, cycles, type and
//! slider invariants), so the engine never sees a graph the editor could not produce.

use crate::config::EditorConfig;
use crate::error::{GraphError, GraphResult};
use crate::store::{self, ConnectionKind, NodeId, NodeKind, NodeType, Point, ScenarioGraph, Target};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub metadata: Metadata,
    pub nodes: Vec<GraphNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: u32,
    pub title: String,
    pub canvas: Canvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self { width: 1920.0, height: 1080.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub title: String,
    pub position: Position,
    pub slider_index: Option<usize>,
    pub probability: Option<u32>,
    #[serde(default)]
    pub connections: Vec<GraphConnection>,
}

/// Exactly one of `target_id` or the `(target_x, target_y)` pair is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConnection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_y: Option<f64>,
    #[serde(rename = "type")]
    pub kind: ConnectionKind,
    #[serde(default)]
    pub label: String,
}

impl Document {
    pub fn from_graph(graph: &ScenarioGraph, title: impl Into<String>, canvas: Canvas) -> Self {
        Self::with_metadata(graph, Metadata { version: DOCUMENT_VERSION, title: title.into(), canvas })
    }

    /// Snapshots `graph` under metadata carried over from a loaded document. The
    /// version is always written as the current one.
    pub fn with_metadata(graph: &ScenarioGraph, metadata: Metadata) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|n| GraphNode {
                id: n.id.0.clone(),
                node_type: n.kind.node_type(),
                title: n.title.clone(),
                position: Position { x: n.position.x, y: n.position.y },
                slider_index: n.kind.slider_index(),
                probability: n.kind.probability().map(u32::from),
                connections: n.connections.iter().map(GraphConnection::from).collect(),
            })
            .collect();

        Self {
            metadata: Metadata { version: DOCUMENT_VERSION, ..metadata },
            nodes,
        }
    }

    /// Builds and validates the graph this document describes.
    pub fn into_graph(self, config: EditorConfig) -> GraphResult<ScenarioGraph> {
        self.into_parts(config).map(|(_, graph)| graph)
    }

    /// Like `into_graph`, but hands back the metadata so a later save can reuse it.
    pub fn into_parts(self, config: EditorConfig) -> GraphResult<(Metadata, ScenarioGraph)> {
        if self.metadata.version > DOCUMENT_VERSION {
            return Err(GraphError::InvalidDocument(format!(
                "document version {} is newer than supported version {}",
                self.metadata.version, DOCUMENT_VERSION
            )));
        }
        let nodes = self.nodes.into_iter().map(GraphNode::into_node).collect::<GraphResult<Vec<_>>>()?;
        log::debug!("loaded document '{}' with {} node(s)", self.metadata.title, nodes.len());
        Ok((self.metadata, ScenarioGraph::from_nodes(nodes, config)?))
    }

    pub fn from_json(s: &str) -> GraphResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> GraphResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_reader(reader: impl Read) -> GraphResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_writer(&self, writer: impl Write) -> GraphResult<()> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }
}

impl GraphNode {
    fn into_node(self) -> GraphResult<store::Node> {
        let id = NodeId(self.id);
        let kind = match (self.node_type, self.slider_index, self.probability) {
            (NodeType::Question, Some(slider_index), Some(probability)) => {
                let probability = u8::try_from(probability)
                    .ok()
                    .filter(|p| *p <= 100)
                    .ok_or_else(|| GraphError::InvalidDocument(format!("node '{}': probability {} is not a percentage", id, probability)))?;
                NodeKind::Question { slider_index, probability }
            }
            (NodeType::Question, _, _) => {
                return Err(GraphError::InvalidDocument(format!("question '{}' needs both sliderIndex and probability", id)))
            }
            (other, None, None) => match other {
                NodeType::Start => NodeKind::Start,
                NodeType::Intermediate => NodeKind::Intermediate,
                outcome => NodeKind::Outcome(outcome.outcome().unwrap_or_else(|| unreachable!("remaining tags are outcomes"))),
            },
            (other, _, _) => {
                return Err(GraphError::InvalidDocument(format!(
                    "node '{}' of type '{}' must not carry sliderIndex or probability",
                    id,
                    other.tag()
                )))
            }
        };

        let connections = self
            .connections
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.into_connection(&id, i))
            .collect::<GraphResult<store::Connections>>()?;

        Ok(store::Node {
            kind,
            title: self.title,
            position: Point::new(self.position.x, self.position.y),
            connections,
            id,
        })
    }
}

impl GraphConnection {
    fn into_connection(self, source: &NodeId, index: usize) -> GraphResult<store::Connection> {
        let target = match (self.target_id, self.target_x, self.target_y) {
            (Some(id), None, None) => Target::Node(NodeId(id)),
            (None, Some(x), Some(y)) => Target::Floating(Point::new(x, y)),
            _ => {
                return Err(GraphError::InvalidDocument(format!(
                    "connection #{} of '{}' needs either targetId or targetX/targetY",
                    index, source
                )))
            }
        };
        Ok(store::Connection { kind: self.kind, target, label: self.label })
    }
}

impl From<&store::Connection> for GraphConnection {
    fn from(c: &store::Connection) -> Self {
        let (target_id, target_x, target_y) = match &c.target {
            Target::Node(id) => (Some(id.0.clone()), None, None),
            Target::Floating(p) => (None, Some(p.x), Some(p.y)),
        };
        Self { target_id, target_x, target_y, kind: c.kind, label: c.label.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::propagate;
    use crate::store::Direction;

    const SCENARIO_A: &str = r#"{
        "metadata": { "version": 1, "title": "Rain", "canvas": { "width": 800, "height": 600 } },
        "nodes": [
            { "id": "s", "type": "s", "title": "Start", "position": { "x": 0, "y": 0 },
              "sliderIndex": null, "probability": null,
              "connections": [ { "targetId": "q", "type": "-", "label": "" } ] },
            { "id": "q", "type": "n", "title": "Rain?", "position": { "x": 0, "y": 100 },
              "sliderIndex": 0, "probability": 70,
              "connections": [ { "targetId": "g", "type": "y", "label": "Yes" },
                               { "targetId": "e", "type": "n", "label": "No" } ] },
            { "id": "g", "type": "g", "title": "Dry", "position": { "x": -100, "y": 200 },
              "sliderIndex": null, "probability": null, "connections": [] },
            { "id": "e", "type": "e", "title": "Flood", "position": { "x": 100, "y": 200 },
              "sliderIndex": null, "probability": null, "connections": [] }
        ]
    }"#;

    fn load(json: &str) -> GraphResult<ScenarioGraph> {
        Document::from_json(json)?.into_graph(EditorConfig::default())
    }

    #[test]
    fn test_load_scenario_a() {
        let g = load(SCENARIO_A).unwrap();
        let ledger = propagate(&g, &g.slider_values(), g.start_id()).unwrap();
        assert!((ledger.get(&"g".into()).unwrap() - 0.7).abs() < 1e-12);
        assert!((ledger.get(&"e".into()).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_is_bit_identical() {
        let mut g = load(SCENARIO_A).unwrap();
        let i = g.add_node(Point::new(33.3, 71.7)).unwrap();
        g.add_connection(&i, Direction::Up).unwrap();
        g.set_probability(&i, 13).unwrap();

        let doc = Document::from_graph(&g, "Rain", Canvas::default());
        let reparsed = Document::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, doc);

        let g2 = reparsed.into_graph(EditorConfig::default()).unwrap();
        assert_eq!(g2.nodes(), g.nodes());
        for root in g.nodes().iter().map(|n| n.id.clone()) {
            let a = propagate(&g, &g.slider_values(), &root).unwrap();
            let b = propagate(&g2, &g2.slider_values(), &root).unwrap();
            let bits = |l: &crate::compute::ProbabilityLedger| l.node_probabilities().iter().map(|p| p.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(&a), bits(&b));
        }
    }

    #[test]
    fn test_reader_writer_through_file() {
        let g = load(SCENARIO_A).unwrap();
        let doc = Document::from_graph(&g, "Rain", Canvas { width: 800.0, height: 600.0 });

        let file = tempfile::NamedTempFile::new().unwrap();
        doc.to_writer(file.reopen().unwrap()).unwrap();
        let back = Document::from_reader(file.reopen().unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_metadata_survives_edit_and_save() {
        let (metadata, mut g) = Document::from_json(SCENARIO_A).unwrap().into_parts(EditorConfig::default()).unwrap();
        g.set_title(&"q".into(), "Storm?").unwrap();

        let saved = Document::from_json(&Document::with_metadata(&g, metadata).to_json().unwrap()).unwrap();
        assert_eq!(saved.metadata.title, "Rain");
        assert_eq!(saved.metadata.canvas, Canvas { width: 800.0, height: 600.0 });
        assert_eq!(saved.metadata.version, DOCUMENT_VERSION);
        assert_eq!(saved.nodes[1].title, "Storm?");
    }

    #[test]
    fn test_floating_targets_serialize_as_coordinates() {
        let g = ScenarioGraph::new();
        let json = Document::from_graph(&g, "", Canvas::default()).to_json().unwrap();
        assert!(json.contains("\"targetX\""));
        assert!(!json.contains("\"targetId\""));
        assert!(json.contains("\"type\": \"-\""));
    }

    #[test]
    fn test_unknown_reference_is_refused() {
        let json = SCENARIO_A.replace(r#""targetId": "g""#, r#""targetId": "missing""#);
        let err = load(&json).unwrap_err();
        assert_eq!(err, GraphError::UnknownReference { source_node: "q".into(), target: "missing".into() });
    }

    #[test]
    fn test_stored_cycle_is_refused_on_load() {
        // g is turned into an intermediate pointing back at q.
        let json = SCENARIO_A.replace(
            r#""type": "g", "title": "Dry", "position": { "x": -100, "y": 200 },
              "sliderIndex": null, "probability": null, "connections": []"#,
            r#""type": "i", "title": "Dry", "position": { "x": -100, "y": 200 },
              "sliderIndex": null, "probability": null, "connections": [ { "targetId": "q", "type": "-", "label": "" } ]"#,
        );
        assert_ne!(json, SCENARIO_A);
        assert!(matches!(load(&json), Err(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn test_ambiguous_connection_target() {
        let json = SCENARIO_A.replace(r#"{ "targetId": "g", "type": "y""#, r#"{ "targetId": "g", "targetX": 1, "targetY": 2, "type": "y""#);
        assert!(matches!(load(&json), Err(GraphError::InvalidDocument(_))));
    }

    #[test]
    fn test_question_without_slider() {
        let json = SCENARIO_A.replace(r#""sliderIndex": 0, "probability": 70"#, r#""sliderIndex": null, "probability": 70"#);
        assert!(matches!(load(&json), Err(GraphError::InvalidDocument(_))));
    }

    #[test]
    fn test_bad_type_tag_is_serialization_error() {
        let json = SCENARIO_A.replace(r#""type": "e""#, r#""type": "x""#);
        assert!(matches!(load(&json), Err(GraphError::Serialization(_))));
    }
}
