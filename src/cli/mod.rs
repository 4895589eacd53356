//! Command-line interface for music-indexer.
//!
//! This module provides the commands that run a library scan and inspect
//! the resulting index.

mod commands;

pub use commands::{Cli, Commands, run_command};
