//! Command-line interface for sat-siege.
//!
//! Provides the pipeline runner, the long-lived dispatch workers, and
//! cluster fleet management.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
