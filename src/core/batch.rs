//! Batch driver: discovery, parallel validation, and persistence.

use crate::core::error::ProvcheckError;
use crate::core::report::{CallStats, CheckName, ValidationIssue, ValidationReport};
use crate::core::time;
use crate::core::validate::Validator;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSON files in a data directory that are not transcripts.
pub const EXCLUDED_FILES: [&str; 3] = ["schema.json", "tools_dict.json", "results.json"];

pub const CSV_COLUMNS: [&str; 15] = [
    "file_path",
    "timestamp",
    "schema_validation",
    "placeholder_check",
    "token_consistency",
    "parameter_flow_check",
    "hallucination_check",
    "user_identifier_check",
    "system_message_validation",
    "function_validation",
    "message_structure",
    "total_function_calls",
    "unique_functions_called",
    "function_call_breakdown",
    "errors",
];

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ProvcheckError> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if name.ends_with(".json") && !EXCLUDED_FILES.contains(&name) {
            found.push(path);
        }
    }
    found.sort_by_key(|p| sort_key(p));
    out.extend(found);
    Ok(())
}

/// Numbered files first, by the digits in their name; then by name.
fn sort_key(path: &Path) -> (bool, u128, String) {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    match digits.parse::<u128>() {
        Ok(n) => (false, n, name),
        Err(_) => (true, 0, name),
    }
}

/// Expand `paths` into transcript files. Directories are scanned one level
/// deep; explicit files are taken as given.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ProvcheckError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_json_files(path, &mut files)?;
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(ProvcheckError::NotFound(format!(
                "no such file or directory: {}",
                path.display()
            )));
        }
    }
    Ok(files)
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub sha256: String,
    #[serde(flatten)]
    pub report: ValidationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub ts: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

fn validate_file(validator: &Validator, path: &Path) -> FileOutcome {
    let shown = path.display().to_string();
    match fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let sha256 = format!("{:x}", hasher.finalize());
            let text = String::from_utf8_lossy(&bytes);
            FileOutcome {
                sha256,
                report: validator.validate_text(&shown, &text),
            }
        }
        Err(e) => {
            tracing::warn!(file = %shown, error = %e, "could not read transcript");
            let issue = ValidationIssue::error(
                CheckName::SchemaValidation,
                format!("Could not read file: {}", e),
            );
            FileOutcome {
                sha256: String::new(),
                report: ValidationReport::new(&shown, vec![issue], &CallStats::default()),
            }
        }
    }
}

/// Validate every file in parallel; results keep the order of `files`.
pub fn validate_files(validator: &Validator, files: &[PathBuf]) -> BatchSummary {
    let results: Vec<FileOutcome> = files
        .par_iter()
        .map(|path| validate_file(validator, path))
        .collect();
    let passed = results.iter().filter(|r| r.report.passed).count();
    tracing::info!(total = results.len(), passed, "validate: batch done");
    BatchSummary {
        run_id: time::new_run_id(),
        ts: time::now_epoch_z(),
        total: results.len(),
        passed,
        failed: results.len() - passed,
        results,
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

pub fn csv_row(report: &ValidationReport, timestamp: &str) -> String {
    let mut fields = vec![report.file_path.clone(), timestamp.to_string()];
    fields.extend(CheckName::ALL.iter().map(|c| report.status(*c).to_string()));
    fields.push(report.total_function_calls.to_string());
    fields.push(report.unique_functions_called.to_string());
    fields.push(report.function_call_breakdown.clone());
    fields.push(report.errors.join("; "));
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn write_csv(summary: &BatchSummary, path: &Path) -> Result<(), ProvcheckError> {
    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');
    for outcome in &summary.results {
        out.push_str(&csv_row(&outcome.report, &summary.ts));
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Append one JSON line per transcript, tagged with the run id.
pub fn append_jsonl(summary: &BatchSummary, path: &Path) -> Result<(), ProvcheckError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for outcome in &summary.results {
        let mut line = serde_json::to_value(outcome)?;
        if let Some(obj) = line.as_object_mut() {
            obj.insert("run_id".to_string(), summary.run_id.clone().into());
            obj.insert("ts".to_string(), summary.ts.clone().into());
        }
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
    }
    Ok(())
}
