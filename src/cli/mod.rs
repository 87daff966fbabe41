//! CLI layer for dkr-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! serving the retrieval protocol and inspecting the tool catalog.

pub mod commands;
pub mod parser;

pub use commands::execute;
pub use parser::{Cli, Commands, ServeCommands};
