//! batch.rs
//! Parallel evaluation of independent propagation runs.
//!
//! Each run is a pure function of (graph, sliders, root), so scenarios can be fanned
//! out across threads without coordination. Used to precompute every hover-preview
//! root, or to sweep a slider.

use crate::compute::engine::ProbabilityEngine;
use crate::compute::ledger::{ProbabilityLedger, SliderValues};
use crate::error::GraphResult;
use crate::store::{NodeId, ScenarioGraph};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub root: NodeId,
    pub sliders: SliderValues,
}

/// Runs every scenario against the same graph. Results keep the input order.
pub fn propagate_scenarios(graph: &ScenarioGraph, scenarios: &[Scenario]) -> Vec<GraphResult<ProbabilityLedger>> {
    let engine = ProbabilityEngine::new(graph.nodes());
    scenarios
        .par_iter()
        .map(|s| engine.propagate(&s.sliders, &s.root))
        .collect()
}

/// One ledger per node, each computed with that node as the root.
pub fn preview_all_roots(graph: &ScenarioGraph, sliders: &SliderValues) -> GraphResult<Vec<ProbabilityLedger>> {
    let engine = ProbabilityEngine::new(graph.nodes());
    graph
        .nodes()
        .par_iter()
        .map(|n| engine.propagate(sliders, &n.id))
        .collect()
}

/// Re-runs propagation with one slider set to each of `percents`.
pub fn sweep_slider(
    graph: &ScenarioGraph,
    sliders: &SliderValues,
    root: &NodeId,
    slider_index: usize,
    percents: &[u8],
) -> GraphResult<Vec<ProbabilityLedger>> {
    let engine = ProbabilityEngine::new(graph.nodes());
    percents
        .par_iter()
        .map(|&p| {
            let mut adjusted = sliders.clone();
            adjusted.insert(slider_index, p);
            engine.propagate(&adjusted, root)
        })
        .collect()
}
