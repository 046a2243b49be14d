//! Probability propagation over the scenario graph.
pub mod batch;
pub mod engine;
pub mod ledger;

pub use batch::{preview_all_roots, propagate_scenarios, sweep_slider, Scenario};
pub use engine::{propagate, ProbabilityEngine};
pub use ledger::{EdgeProbability, ProbabilityLedger, SliderValues};
