//! Python facade over the scenario graph. All structure crosses the boundary as ids,
//! type tags and JSON, so the Python side never holds Rust references.

use crate::compute::{propagate, SliderValues};
use crate::config::EditorConfig;
use crate::display::{projection, trace};
use crate::document::{Canvas, Document, Metadata, DOCUMENT_VERSION};
use crate::error::GraphError;
use crate::store::{Direction, NodeId, NodeType, Point, ScenarioGraph, Target};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

fn to_py_err(e: GraphError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_direction(direction: &str) -> PyResult<Direction> {
    match direction {
        "up" => Ok(Direction::Up),
        "down" => Ok(Direction::Down),
        "left" => Ok(Direction::Left),
        "right" => Ok(Direction::Right),
        other => Err(PyValueError::new_err(format!("Invalid direction: '{}'", other))),
    }
}

#[pyclass(name = "_ScenarioGraph")]
#[derive(Debug)]
pub struct PyScenarioGraph {
    graph: ScenarioGraph,
    /// Title and canvas of the loaded document, written back on save.
    metadata: Metadata,
    /// Persisted root selection; `None` means the Start node.
    root: Option<NodeId>,
}

fn blank_metadata() -> Metadata {
    Metadata { version: DOCUMENT_VERSION, title: String::new(), canvas: Canvas::default() }
}

#[pymethods]
impl PyScenarioGraph {
    #[new]
    #[pyo3(signature = (config_toml=None))]
    pub fn new(config_toml: Option<&str>) -> PyResult<Self> {
        let config = match config_toml {
            Some(s) => EditorConfig::from_toml_str(s).map_err(to_py_err)?,
            None => EditorConfig::default(),
        };
        Ok(Self { graph: ScenarioGraph::with_config(config), metadata: blank_metadata(), root: None })
    }

    #[staticmethod]
    pub fn from_json(json: &str) -> PyResult<Self> {
        let (metadata, graph) = Document::from_json(json)
            .and_then(|d| d.into_parts(EditorConfig::default()))
            .map_err(to_py_err)?;
        Ok(Self { graph, metadata, root: None })
    }

    pub fn to_json(&self) -> PyResult<String> {
        Document::with_metadata(&self.graph, self.metadata.clone()).to_json().map_err(to_py_err)
    }

    pub fn document_title(&self) -> String {
        self.metadata.title.clone()
    }

    pub fn set_document_title(&mut self, title: String) {
        self.metadata.title = title;
    }

    pub fn set_canvas(&mut self, width: f64, height: f64) {
        self.metadata.canvas = Canvas { width, height };
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.graph.nodes().iter().map(|n| n.id.0.clone()).collect()
    }

    pub fn add_node(&mut self, x: f64, y: f64) -> PyResult<String> {
        self.graph.add_node(Point::new(x, y)).map(|id| id.0).map_err(to_py_err)
    }

    pub fn delete_node(&mut self, node_id: &str) -> PyResult<()> {
        let id = NodeId::from(node_id);
        self.graph.delete_node(&id).map_err(to_py_err)?;
        if self.root.as_ref() == Some(&id) {
            self.root = None;
        }
        Ok(())
    }

    pub fn add_connection(&mut self, node_id: &str, direction: &str) -> PyResult<()> {
        let direction = parse_direction(direction)?;
        self.graph.add_connection(&node_id.into(), direction).map_err(to_py_err)
    }

    pub fn delete_connection(&mut self, node_id: &str, connection: usize) -> PyResult<()> {
        self.graph.delete_connection(&node_id.into(), connection).map_err(to_py_err)
    }

    pub fn reconnect_to_node(&mut self, node_id: &str, connection: usize, target_id: &str) -> PyResult<()> {
        self.graph
            .reconnect_connection(&node_id.into(), connection, Target::Node(target_id.into()))
            .map_err(to_py_err)
    }

    pub fn reconnect_to_point(&mut self, node_id: &str, connection: usize, x: f64, y: f64) -> PyResult<()> {
        self.graph
            .reconnect_connection(&node_id.into(), connection, Target::Floating(Point::new(x, y)))
            .map_err(to_py_err)
    }

    pub fn attach_or_float(&mut self, node_id: &str, connection: usize, target_id: &str, x: f64, y: f64) -> PyResult<bool> {
        self.graph
            .attach_or_float(&node_id.into(), connection, &target_id.into(), Point::new(x, y))
            .map_err(to_py_err)
    }

    pub fn update_connection_label(&mut self, node_id: &str, connection: usize, text: String) -> PyResult<()> {
        self.graph.update_connection_label(&node_id.into(), connection, text).map_err(to_py_err)
    }

    pub fn change_node_type(&mut self, node_id: &str, type_tag: &str) -> PyResult<()> {
        let new_type = NodeType::from_tag(type_tag)
            .ok_or_else(|| PyValueError::new_err(format!("Invalid node type: '{}'", type_tag)))?;
        self.graph.change_node_type(&node_id.into(), new_type).map_err(to_py_err)
    }

    pub fn create_node_from_floating_target(&mut self, node_id: &str, connection: usize) -> PyResult<String> {
        self.graph
            .create_node_from_floating_target(&node_id.into(), connection)
            .map(|id| id.0)
            .map_err(to_py_err)
    }

    pub fn set_probability(&mut self, node_id: &str, percent: u8) -> PyResult<()> {
        self.graph.set_probability(&node_id.into(), percent).map_err(to_py_err)
    }

    pub fn set_title(&mut self, node_id: &str, title: String) -> PyResult<()> {
        self.graph.set_title(&node_id.into(), title).map_err(to_py_err)
    }

    pub fn move_node(&mut self, node_id: &str, x: f64, y: f64) -> PyResult<()> {
        self.graph.move_node(&node_id.into(), Point::new(x, y)).map_err(to_py_err)
    }

    #[pyo3(signature = (node_id=None))]
    pub fn set_root(&mut self, node_id: Option<&str>) -> PyResult<()> {
        let root = node_id.map(NodeId::from);
        if let Some(id) = &root {
            if self.graph.node(id).is_none() {
                return Err(to_py_err(GraphError::UnknownNode(id.clone())));
            }
        }
        self.root = root;
        Ok(())
    }

    /// Runs propagation and returns the render projection as JSON. `preview_root`
    /// overrides the persisted root for this call only; `sliders` is laid over the
    /// probabilities stored on the Question nodes, so a partial map is fine.
    #[pyo3(signature = (preview_root=None, sliders=None))]
    pub fn propagate(&self, preview_root: Option<&str>, sliders: Option<HashMap<usize, u8>>) -> PyResult<String> {
        let root = match preview_root {
            Some(r) => NodeId::from(r),
            None => self.root.clone().unwrap_or_else(|| self.graph.start_id().clone()),
        };
        let mut values: SliderValues = self.graph.slider_values();
        values.extend(sliders.unwrap_or_default());
        let ledger = propagate(&self.graph, &values, &root).map_err(to_py_err)?;
        projection::project(&self.graph, &ledger).and_then(|p| p.to_json()).map_err(to_py_err)
    }

    pub fn trace_node(&self, node_id: &str) -> PyResult<String> {
        let root = self.root.clone().unwrap_or_else(|| self.graph.start_id().clone());
        let ledger = propagate(&self.graph, &self.graph.slider_values(), &root).map_err(to_py_err)?;
        Ok(trace::format_trace(&self.graph, &ledger, &node_id.into()))
    }

    pub fn node_count(&self) -> usize {
        self.graph.len()
    }
}
