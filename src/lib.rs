//! Cosmos DB connectivity probe.
//!
//! Connects to the configured account with ambient AAD credentials, resolves
//! the database and container handles, and prints a single outcome line.

pub mod app;
pub mod probe;

pub use app::{run, RunOptions};
pub use probe::{ClientGuard, Outcome, Probe, ProbeState, FAILURE_PREFIX, SUCCESS_MESSAGE};
