//! provcheck: provenance and structure validation for tool-calling transcripts.
//!
//! A transcript is a system message, a user request, and a chain of
//! chain-of-thought notes, tool invocations and tool results ending in an
//! assistant answer. provcheck decides whether such a transcript is
//! well-formed and whether every tool argument could actually have been
//! known at the point it was used.
//!
//! # Checks
//!
//! - `schema_validation`: document shape, via a [`core::schema::SchemaValidator`]
//! - `placeholder_check`: unfilled template text
//! - `token_consistency`: declared credentials leaking into arguments
//! - `parameter_flow_check`: arguments with no traceable source
//! - `hallucination_check`: the same, after containment/composite/timestamp fallbacks
//! - `user_identifier_check`: untracked entity ids the user never supplied
//! - `system_message_validation`, `function_validation`, `message_structure`:
//!   the role state machine, markers, tool coverage and result content
//!
//! Every check always runs; a transcript passes only when all of them do.
//!
//! # Example
//!
//! ```bash
//! provcheck validate out/ --csv results.csv
//! provcheck flow out/example3.json
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: data model, value index, provenance, report, aggregator, batch driver
//! - [`checks`]: the individual checks

pub mod checks;
mod cli;
pub mod core;

use crate::cli::{Cli, Command, FlowCli, OutputFormat, ValidateCli};
use crate::core::config::load_config;
use crate::core::error::ProvcheckError;
use crate::core::transcript::{ToolCatalog, Transcript};
use crate::core::validate::Validator;
use crate::core::{batch, output, provenance, schema};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Env var holding the tracing filter (default `warn`).
pub const LOG_ENV: &str = "PROVCHECK_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

pub fn run() -> Result<(), ProvcheckError> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Flow(args) => run_flow(args),
        Command::Schema => {
            println!("{}", schema::default_schema_text()?);
            Ok(())
        }
    }
}

fn load_tools(path: &Path) -> Result<ToolCatalog, ProvcheckError> {
    if !path.exists() {
        return Err(ProvcheckError::NotFound(format!(
            "tools file {}",
            path.display()
        )));
    }
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    // Accept either a bare `tools` array or a document carrying one.
    let tools = value.get("tools").cloned().unwrap_or(value);
    if !tools.is_array() {
        return Err(ProvcheckError::SchemaError(format!(
            "{} does not hold a tools array",
            path.display()
        )));
    }
    Ok(ToolCatalog::from_value(&tools))
}

fn run_validate(args: ValidateCli) -> Result<(), ProvcheckError> {
    let current_dir = std::env::current_dir()?;
    let config = load_config(args.config.as_deref(), &current_dir)?;
    let document_schema = schema::load_schema(args.schema.as_deref())?;
    let mut validator = Validator::new(config, document_schema);
    if let Some(path) = &args.tools {
        validator = validator.with_tools(load_tools(path)?);
    }

    let paths = if args.paths.is_empty() {
        vec![PathBuf::from("./out")]
    } else {
        args.paths.clone()
    };
    let files = batch::discover(&paths)?;
    if files.is_empty() {
        println!("validate: no transcript files found");
        return Ok(());
    }
    if args.format == OutputFormat::Text {
        println!("validate: running on {} file(s)", files.len());
    }

    let summary = batch::validate_files(&validator, &files);

    match args.format {
        OutputFormat::Text => {
            for (outcome, path) in summary.results.iter().zip(&files) {
                println!("{}", output::render_report(&outcome.report, args.max_issues));
                if args.show_parameter_flow {
                    print_flow(&validator, path);
                }
            }
            println!(
                "validate: summary total={} pass={} fail={} run_id={}",
                summary.total, summary.passed, summary.failed, summary.run_id
            );
            let failing: Vec<String> = summary
                .results
                .iter()
                .filter(|r| !r.report.passed)
                .map(|r| r.report.file_path.clone())
                .collect();
            if failing.is_empty() {
                println!("validate: {}", "all files passed validation".green());
            } else {
                println!(
                    "validate: failures {}: {}",
                    failing.len(),
                    output::preview_messages(&failing, 3, 110)
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    if let Some(path) = &args.csv {
        batch::write_csv(&summary, path)?;
        tracing::info!(path = %path.display(), "wrote csv results");
    }
    if let Some(path) = &args.jsonl {
        batch::append_jsonl(&summary, path)?;
        tracing::info!(path = %path.display(), "appended jsonl results");
    }

    if summary.all_passed() {
        Ok(())
    } else {
        Err(ProvcheckError::ValidationError(format!(
            "{} transcript(s) failed validation.",
            summary.failed
        )))
    }
}

fn print_flow(validator: &Validator, path: &Path) {
    match read_transcript(path) {
        Ok(transcript) => {
            let (index, flow) = validator.trace_flow(&transcript);
            println!("{}", provenance::render_summary(&flow, &index));
        }
        Err(e) => println!(
            "validate: could not generate parameter flow summary for {}: {}",
            path.display(),
            e
        ),
    }
}

fn read_transcript(path: &Path) -> Result<Transcript, ProvcheckError> {
    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    Transcript::from_value(&doc).map_err(|e| ProvcheckError::SchemaError(e.to_string()))
}

fn run_flow(args: FlowCli) -> Result<(), ProvcheckError> {
    let current_dir = std::env::current_dir()?;
    let config = load_config(args.config.as_deref(), &current_dir)?;
    if !args.file.exists() {
        return Err(ProvcheckError::NotFound(format!(
            "transcript {}",
            args.file.display()
        )));
    }
    let transcript = read_transcript(&args.file)?;
    let validator = Validator::new(config, serde_json::Value::Null);
    let (index, flow) = validator.trace_flow(&transcript);
    println!("{}", provenance::render_summary(&flow, &index));
    Ok(())
}
