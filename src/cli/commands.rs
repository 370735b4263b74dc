//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Converge - dependency-ordered cluster resource reconciler.
#[derive(Parser, Debug)]
#[command(name = "converge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the cluster configuration.
    Validate {
        /// Show warnings as well as errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the order in which resources would be reconciled.
    Plan,

    /// Generate a declarative infrastructure document.
    Render {
        /// File to write the document to (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the plan for live infrastructure (always fails without a provider).
    ///
    /// This binary bundles no cloud provider, so `apply` prints the execution
    /// order and exits with an error. Embed the library and pass a
    /// `CloudProvider` to `Reconciler::apply` to mutate live infrastructure.
    Apply,

    /// Keep the configured DNS zone in step with the cluster.
    Dns {
        /// Write the zone here instead of the configured file.
        #[arg(long)]
        zone_file: Option<PathBuf>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render_with_global_flags() {
        let cli = Cli::try_parse_from([
            "converge",
            "render",
            "--out",
            "infra.json",
            "--output",
            "json",
            "--log-json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.log_json);
        assert!(matches!(
            cli.command,
            Commands::Render { out: Some(ref path) } if path == &PathBuf::from("infra.json")
        ));
    }

    #[test]
    fn test_apply_help_mentions_missing_provider() {
        let mut command = Cli::command();
        let apply = command.find_subcommand_mut("apply").unwrap();
        let help = apply.render_long_help().to_string();

        assert!(help.contains("bundles no cloud provider"));
        assert!(apply.get_about().unwrap().to_string().contains("always fails"));
    }
}
