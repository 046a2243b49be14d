//! Scenario graph engine: a DAG of questions and outcomes, the mutation rules that keep
//! it consistent, and the propagation that turns per-question conditional
//! probabilities into a probability for every node and edge.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod document;
pub mod error;
pub mod store;

#[cfg(feature = "python")]
pub mod bindings;

pub use compute::{propagate, ProbabilityEngine, ProbabilityLedger, SliderValues};
pub use config::EditorConfig;
pub use document::Document;
pub use error::{GraphError, GraphResult};
pub use store::{NodeId, ScenarioGraph};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A simple function to confirm the Rust core is callable from Python.
#[cfg(feature = "python")]
#[pyfunction]
fn rust_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Defines the `_core` Python module. The name marks it as an internal, compiled component.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(rust_core_version, m)?)?;
    m.add_class::<bindings::python::PyScenarioGraph>()?;
    Ok(())
}
