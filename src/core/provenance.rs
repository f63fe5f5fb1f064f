//! Per-call parameter provenance.
//!
//! For every scalar argument of every tool invocation, record where its value
//! could have come from: an indexed value visible at that point, or a
//! substring of the system or a user message. Anything else is untracked.

use crate::core::config::ValidatorConfig;
use crate::core::report::{CheckName, ValidationIssue};
use crate::core::transcript::Transcript;
use crate::core::value_index::{Origin, TextHit, ValueIndex, ValueType, scalar_key};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Indexed { origin: Origin },
    SystemText,
    UserText { index: usize },
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Indexed { origin } => write!(f, "{}", origin),
            Source::SystemText => write!(f, "system message"),
            Source::UserText { index } => write!(f, "user input (message {})", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentFlow {
    pub name: String,
    pub value: Value,
    pub value_type: ValueType,
    /// `None` when the value is untracked.
    pub source: Option<Source>,
}

impl ArgumentFlow {
    pub fn key(&self) -> String {
        scalar_key(&self.value).map(|(k, _)| k).unwrap_or_default()
    }

    pub fn is_untracked(&self) -> bool {
        self.source.is_none()
    }
}

/// Provenance of one tool invocation's arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    pub message_index: usize,
    pub function_name: String,
    pub arguments: Vec<ArgumentFlow>,
    /// Object/array arguments, not resolved here.
    pub structured: Vec<String>,
}

impl FlowRecord {
    pub fn untracked(&self) -> impl Iterator<Item = &ArgumentFlow> {
        self.arguments.iter().filter(|a| a.is_untracked())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallParseFailure {
    pub message_index: usize,
    pub function_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterFlow {
    pub records: Vec<FlowRecord>,
    pub failures: Vec<CallParseFailure>,
}

/// Resolve one value as seen by a call at `as_of`.
pub fn resolve_source(index: &ValueIndex, value: &str, as_of: usize) -> Option<Source> {
    if let Some(entry) = index.resolve(value, as_of) {
        return Some(Source::Indexed {
            origin: entry.origin.clone(),
        });
    }
    index.find_in_text(value).map(|hit| match hit {
        TextHit::System => Source::SystemText,
        TextHit::User(index) => Source::UserText { index },
    })
}

pub fn track(transcript: &Transcript, index: &ValueIndex) -> ParameterFlow {
    let mut flow = ParameterFlow::default();
    for (message, invocation) in transcript.calls() {
        let arguments = match invocation.arguments.parse() {
            Ok(arguments) => arguments,
            Err(e) => {
                flow.failures.push(CallParseFailure {
                    message_index: message.index,
                    function_name: invocation.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let mut record = FlowRecord {
            message_index: message.index,
            function_name: invocation.name.clone(),
            arguments: Vec::new(),
            structured: Vec::new(),
        };
        for (name, value) in arguments {
            match scalar_key(&value) {
                Some((key, value_type)) => {
                    let source = resolve_source(index, &key, message.index);
                    record.arguments.push(ArgumentFlow {
                        name,
                        value,
                        value_type,
                        source,
                    });
                }
                None if value.is_null() => {}
                None => record.structured.push(name),
            }
        }
        flow.records.push(record);
    }
    flow
}

fn below_flow_threshold(value: &Value, config: &ValidatorConfig) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => n.as_i64().is_some_and(|i| i < config.flow_min_integer),
        Value::String(s) => s.chars().count() < config.flow_min_string_len,
        _ => false,
    }
}

/// Issues for `parameter_flow_check`: parse failures plus untracked values
/// that are not exempt. `is_placeholder` values are left to the placeholder check.
pub fn flow_issues(
    flow: &ParameterFlow,
    config: &ValidatorConfig,
    is_placeholder: impl Fn(&str) -> bool,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for failure in &flow.failures {
        issues.push(
            ValidationIssue::error(
                CheckName::ParameterFlowCheck,
                format!(
                    "Could not parse function arguments for '{}' at message {}: {}",
                    failure.function_name, failure.message_index, failure.reason
                ),
            )
            .at(failure.message_index),
        );
    }
    for record in &flow.records {
        for argument in record.untracked() {
            if config.is_flow_exempt(&argument.name) || below_flow_threshold(&argument.value, config)
            {
                continue;
            }
            let key = argument.key();
            if is_placeholder(&key) {
                continue;
            }
            issues.push(
                ValidationIssue::error(
                    CheckName::ParameterFlowCheck,
                    format!(
                        "Parameter '{}' in function '{}' (message {}) with value '{}' has no traceable source from previous outputs, system message, or user input",
                        argument.name, record.function_name, record.message_index, key
                    ),
                )
                .at(record.message_index),
            );
        }
    }
    issues
}

/// Human-readable flow summary for `--show-parameter-flow`.
pub fn render_summary(flow: &ParameterFlow, index: &ValueIndex) -> String {
    let mut out = String::new();
    out.push_str("Parameter Flow Summary:\n");
    out.push_str(&format!(
        "  Total function outputs tracked: {}\n",
        index.outputs().len()
    ));
    out.push_str(&format!(
        "  Total function calls tracked: {}\n",
        flow.records.len()
    ));
    out.push_str(&format!(
        "  Total output parameters tracked: {}\n",
        index.output_value_count()
    ));
    for record in &flow.records {
        out.push_str(&format!(
            "\n  {} (message {}):\n",
            record.function_name, record.message_index
        ));
        for argument in &record.arguments {
            if let Some(source) = &argument.source {
                out.push_str(&format!("    {}: from {}\n", argument.name, source));
            }
        }
        let untracked: Vec<&str> = record.untracked().map(|a| a.name.as_str()).collect();
        if !untracked.is_empty() {
            out.push_str(&format!(
                "    Untracked parameters: {}\n",
                untracked.join(", ")
            ));
        }
    }
    for failure in &flow.failures {
        out.push_str(&format!(
            "\n  {} (message {}): arguments not parsed ({})\n",
            failure.function_name, failure.message_index, failure.reason
        ));
    }
    out
}
