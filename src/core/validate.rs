//! The validation aggregator.
//!
//! Runs every check unconditionally against one transcript and folds all
//! issues into a single [`ValidationReport`]. Nothing here returns an error:
//! unreadable input becomes a `schema_validation` issue.

use crate::checks::{hallucination, identifiers, placeholder, sequence, tokens};
use crate::core::config::ValidatorConfig;
use crate::core::error::ProvcheckError;
use crate::core::provenance;
use crate::core::report::{CallStats, CheckName, ValidationIssue, ValidationReport};
use crate::core::schema::{self, JsonSchemaValidator, SchemaValidator};
use crate::core::transcript::{ToolCatalog, Transcript};
use crate::core::value_index::ValueIndex;
use serde_json::Value;

fn trace_gate(name: &str) {
    tracing::debug!(gate = name, "validate: trace");
}

/// One validator per batch; holds only read-only inputs, so a single instance
/// may serve many threads.
pub struct Validator {
    config: ValidatorConfig,
    document_schema: Value,
    tools: Option<ToolCatalog>,
    schemas: Box<dyn SchemaValidator>,
}

impl Validator {
    pub fn new(config: ValidatorConfig, document_schema: Value) -> Self {
        Self {
            config,
            document_schema,
            tools: None,
            schemas: Box::new(JsonSchemaValidator),
        }
    }

    /// Default config and the embedded document schema.
    pub fn stock() -> Result<Self, ProvcheckError> {
        Ok(Self::new(ValidatorConfig::default(), schema::default_schema()?))
    }

    /// Declared tools from outside the transcript; overrides its `tools` array.
    pub fn with_tools(mut self, tools: ToolCatalog) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_schema_validator(mut self, schemas: Box<dyn SchemaValidator>) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate_text(&self, file_path: &str, text: &str) -> ValidationReport {
        match serde_json::from_str::<Value>(text) {
            Ok(doc) => self.validate_document(file_path, &doc),
            Err(e) => {
                tracing::warn!(file = file_path, error = %e, "transcript is not valid JSON");
                let issue = ValidationIssue::error(
                    CheckName::SchemaValidation,
                    format!("Transcript is not valid JSON: {}", e),
                );
                ValidationReport::new(file_path, vec![issue], &CallStats::default())
            }
        }
    }

    pub fn validate_document(&self, file_path: &str, doc: &Value) -> ValidationReport {
        let mut issues = Vec::new();

        trace_gate("schema_validation");
        if let Err(reasons) = self.schemas.check(&self.document_schema, doc) {
            issues.extend(
                reasons
                    .into_iter()
                    .map(|r| ValidationIssue::error(CheckName::SchemaValidation, r)),
            );
        }

        let transcript = match Transcript::from_value(doc) {
            Ok(t) => t,
            Err(e) => {
                issues.push(ValidationIssue::error(
                    CheckName::SchemaValidation,
                    e.to_string(),
                ));
                return ValidationReport::new(file_path, issues, &CallStats::default());
            }
        };

        let (more, stats) = self.run_checks(&transcript);
        issues.extend(more);
        let report = ValidationReport::new(file_path, issues, &stats);
        tracing::debug!(
            file = file_path,
            passed = report.passed,
            issues = report.issues.len(),
            "validate: transcript done"
        );
        report
    }

    /// Every content check, in report order.
    pub fn run_checks(&self, transcript: &Transcript) -> (Vec<ValidationIssue>, CallStats) {
        let config = &self.config;
        let catalog = self.tools.as_ref().or(transcript.declared_tools());
        let index = ValueIndex::build(transcript, config);
        let flow = provenance::track(transcript, &index);
        let scanner = placeholder::PlaceholderScanner::new(config);
        let is_placeholder = |v: &str| scanner.is_placeholder(v);

        let mut issues = Vec::new();
        trace_gate("placeholder_check");
        issues.extend(placeholder::check(transcript, &scanner));
        trace_gate("token_consistency");
        issues.extend(tokens::check(transcript, config));
        trace_gate("parameter_flow_check");
        issues.extend(provenance::flow_issues(&flow, config, is_placeholder));
        trace_gate("hallucination_check");
        issues.extend(hallucination::check(transcript, &index, config, is_placeholder));
        trace_gate("user_identifier_check");
        issues.extend(identifiers::check(transcript, &flow, config, is_placeholder));
        trace_gate("system_message_validation");
        issues.extend(sequence::check_system_message(transcript, config));
        trace_gate("function_validation");
        issues.extend(sequence::check_functions(
            transcript,
            catalog,
            config,
            self.schemas.as_ref(),
        ));
        trace_gate("message_structure");
        issues.extend(sequence::check_structure(transcript, catalog));

        let mut stats = CallStats::default();
        for (_, invocation) in transcript.calls() {
            stats.record(&invocation.name);
        }
        (issues, stats)
    }

    /// Index and flow records for one transcript, for the flow summary.
    pub fn trace_flow(&self, transcript: &Transcript) -> (ValueIndex, provenance::ParameterFlow) {
        let index = ValueIndex::build(transcript, &self.config);
        let flow = provenance::track(transcript, &index);
        (index, flow)
    }
}
