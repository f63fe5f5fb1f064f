//! CLI struct definitions for the provcheck command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "provcheck",
    version = env!("CARGO_PKG_VERSION"),
    about = "Validate tool-calling transcripts: structure, placeholders, credentials, and the provenance of every argument."
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ValidateCli {
    /// Transcript files or directories (default: ./out).
    pub paths: Vec<PathBuf>,
    /// Document schema replacing the embedded default.
    #[clap(long)]
    pub schema: Option<PathBuf>,
    /// Declared tool set (`tools` array shape) replacing each transcript's own.
    #[clap(long)]
    pub tools: Option<PathBuf>,
    /// Validator config; defaults to ./provcheck.toml when present.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Output format.
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// Write one CSV row per transcript.
    #[clap(long)]
    pub csv: Option<PathBuf>,
    /// Append one JSON report per line.
    #[clap(long)]
    pub jsonl: Option<PathBuf>,
    /// Print the parameter-flow summary for every transcript.
    #[clap(long, short = 'p')]
    pub show_parameter_flow: bool,
    /// Issues listed per transcript in text output.
    #[clap(long, default_value_t = 10)]
    pub max_issues: usize,
}

#[derive(clap::Args, Debug)]
pub(crate) struct FlowCli {
    /// Transcript to trace.
    pub file: PathBuf,
    /// Validator config; defaults to ./provcheck.toml when present.
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Validate transcripts and report every failing check
    Validate(ValidateCli),
    /// Show where each tool-call argument of one transcript comes from
    Flow(FlowCli),
    /// Print the embedded transcript document schema
    Schema,
}
