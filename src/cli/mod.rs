//! CLI module for the converge tool.
//!
//! This module provides the command-line interface for validating,
//! rendering and applying cluster configurations.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
