//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{InspectCommand, RunCommand, TraceCommand, ValidateCommand};
use std::ffi::OsString;

/// Run and inspect inference-serving pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeline")]
#[command(version)]
#[command(about = "Run and inspect inference-serving pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to engine configuration file (profiler and metrics settings)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline on one input
    Run(RunCommand),

    /// Validate a pipeline document
    Validate(ValidateCommand),

    /// Show the contents of a data file
    Inspect(InspectCommand),

    /// Summarize a profiler trace file
    Trace(TraceCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
