//! Read-only views over a computed ledger: the renderer projection and the audit trace.
pub mod projection;
pub mod trace;

pub use projection::{project, Projection};
pub use trace::format_trace;
