//! CLI module
//!
//! This module defines the command-line interface using clap and implements
//! the command execution logic.

use crate::config::{ModelFormat, PartitioningStrategy};
use crate::{Config, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;
pub mod output;

/// Infers communicating finite-state machine models from concurrent traces
#[derive(Parser, Debug)]
#[command(name = "cfsm-infer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (overrides config; RUST_LOG overrides both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Infer a CFSM and refine it until the invariants hold
    Infer {
        /// Trace file (JSON)
        traces: PathBuf,

        /// Invariant file (JSON)
        invariants: PathBuf,

        /// Model checker wrapper (overrides config)
        #[arg(long, env = "CFSM_INFER_CHECKER")]
        checker: Option<PathBuf>,

        /// Model encoding handed to the checker (overrides config)
        #[arg(long, value_enum)]
        format: Option<ModelFormat>,

        /// Initial partitioning (overrides config)
        #[arg(long, value_enum)]
        partitioning: Option<PartitioningStrategy>,

        /// Run partition consistency checks after every step
        #[arg(long)]
        strict: bool,

        /// Seed for the placement of unclassified observations
        #[arg(long)]
        seed: Option<u64>,

        /// Number of invariants checked concurrently
        #[arg(long)]
        parallel: Option<usize>,

        /// Maximum number of check-and-refine rounds
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "scm")]
        output: OutputFormat,
    },

    /// Synthesize a CFSM from traces without model checking
    Export {
        /// Trace file (JSON)
        traces: PathBuf,

        /// Initial partitioning (overrides config)
        #[arg(long, value_enum)]
        partitioning: Option<PartitioningStrategy>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "scm")]
        output: OutputFormat,

        /// Export the partition graph instead of the CFSM (dot only)
        #[arg(long)]
        gfsm: bool,
    },

    /// Validate a trace file and print statistics
    Validate {
        /// Trace file (JSON)
        traces: PathBuf,

        /// Invariant file to validate alongside
        #[arg(long)]
        invariants: Option<PathBuf>,
    },
}

/// Output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// SCM (McScM input)
    Scm,
    /// Promela (Spin input)
    Promela,
    /// DOT format (Graphviz)
    Dot,
    /// JSON output
    Json,
    /// Plain text table
    Table,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Scm => "scm",
            OutputFormat::Promela => "pml",
            OutputFormat::Dot => "dot",
            OutputFormat::Json => "json",
            OutputFormat::Table => "txt",
        }
    }
}

/// Execute the CLI command
pub async fn execute(args: Cli, config: Config) -> Result<()> {
    match args.command {
        Commands::Infer { .. } => commands::infer::execute(args, config).await,
        Commands::Export { .. } => commands::export::execute(args, config),
        Commands::Validate { traces, invariants } => commands::validate::execute(traces, invariants),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "cfsm-infer",
            "infer",
            "traces.json",
            "invariants.json",
            "--checker",
            "/usr/bin/mc",
            "--format",
            "promela",
            "--strict",
            "--seed",
            "3",
            "--output",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Infer {
                format,
                strict,
                seed,
                output,
                ..
            } => {
                assert_eq!(format, Some(ModelFormat::Promela));
                assert!(strict);
                assert_eq!(seed, Some(3));
                assert_eq!(output, OutputFormat::Json);
            }
            _ => panic!("expected infer"),
        }
    }

    #[test]
    fn test_export_parsing() {
        let cli = Cli::try_parse_from([
            "cfsm-infer",
            "--log-level",
            "debug",
            "export",
            "traces.json",
            "--partitioning",
            "singleton",
            "-o",
            "dot",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Commands::Export {
                partitioning: Some(PartitioningStrategy::Singleton),
                output: OutputFormat::Dot,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_arguments() {
        assert!(Cli::try_parse_from(["cfsm-infer", "infer", "traces.json"]).is_err());
    }
}
