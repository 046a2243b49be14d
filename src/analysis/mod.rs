//! Structural analysis: reachability, the reconnect cycle guard and invariant validation.
pub mod topology;
pub mod validation;
