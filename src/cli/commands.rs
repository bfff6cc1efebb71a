//! CLI command definitions

use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline document (YAML or JSON)
    #[arg(short, long)]
    pub file: String,

    /// Path to input data (JSON, YAML or binary)
    #[arg(short, long)]
    pub input: String,

    /// Write the output here instead of printing it
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = DataFormat::Json)]
    pub format: DataFormat,

    /// Print collected metrics after the run
    #[arg(long)]
    pub metrics: bool,
}

/// Validate a pipeline document
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline document
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show a data file
#[derive(Debug, Args, Clone)]
pub struct InspectCommand {
    /// Path to data file
    #[arg(short, long)]
    pub file: String,

    /// Dump the full contents in this format instead of a key listing
    #[arg(long, value_enum)]
    pub format: Option<DataFormat>,
}

/// Summarize a trace file
#[derive(Debug, Args, Clone)]
pub struct TraceCommand {
    /// Path to trace file
    #[arg(short, long)]
    pub file: String,
}

/// Data serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DataFormat {
    Json,
    Yaml,
    Binary,
}
