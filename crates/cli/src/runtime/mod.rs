//! Service runtime: wires configuration, broker and dispatcher together.

mod orchestrator;
mod stats;

pub use orchestrator::{Runtime, RuntimeOptions};
pub use stats::RunStats;
