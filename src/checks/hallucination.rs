//! Argument values with no explanation under any accepted heuristic.
//!
//! Resolution starts with the same exact lookup as the provenance tracker and
//! then admits values built by formatting or assembly: containment in earlier
//! text, a composite free-text field made of known values, or a generated
//! ISO timestamp.

use crate::core::config::ValidatorConfig;
use crate::core::report::{CheckName, ValidationIssue};
use crate::core::transcript::Transcript;
use crate::core::value_index::{Origin, TextHit, ValueIndex, scalar_key};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static ISO_TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T").unwrap());

/// Why a value was accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum Acceptance {
    Indexed(Origin),
    InText(TextHit),
    InToolOutput { message_index: usize },
    Composite(Vec<String>),
    Timestamp,
}

/// Explain `value` for argument `name` of a call at `as_of`, or `None`.
pub fn assess(
    index: &ValueIndex,
    config: &ValidatorConfig,
    name: &str,
    value: &str,
    as_of: usize,
) -> Option<Acceptance> {
    if let Some(entry) = index.resolve(value, as_of) {
        return Some(Acceptance::Indexed(entry.origin.clone()));
    }
    if let Some(output) = index.find_in_outputs(value, as_of) {
        return Some(Acceptance::InToolOutput {
            message_index: output.message_index,
        });
    }
    if let Some(hit) = index.find_in_text(value) {
        return Some(Acceptance::InText(hit));
    }
    if config.is_composite(name) {
        let known = index.known_values_in(value, as_of);
        if known.len() >= config.composite_min_known {
            return Some(Acceptance::Composite(
                known.into_iter().map(str::to_string).collect(),
            ));
        }
    }
    if ISO_TIMESTAMP_RE.is_match(value) {
        return Some(Acceptance::Timestamp);
    }
    None
}

pub fn check(
    transcript: &Transcript,
    index: &ValueIndex,
    config: &ValidatorConfig,
    is_placeholder: impl Fn(&str) -> bool,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (message, invocation) in transcript.calls() {
        // Unparseable arguments are reported by the flow and function checks.
        let Ok(arguments) = invocation.arguments.parse() else {
            continue;
        };
        for (name, value) in &arguments {
            if config.is_hallucination_exempt(name) || matches!(value, Value::Bool(_)) {
                continue;
            }
            let Some((key, _)) = scalar_key(value) else {
                continue;
            };
            if is_placeholder(&key) {
                continue;
            }
            if assess(index, config, name, &key, message.index).is_some() {
                continue;
            }
            issues.push(
                ValidationIssue::advisory(
                    CheckName::HallucinationCheck,
                    format!(
                        "Potential hallucinated value '{}' in parameter '{}' of function '{}' (message {}) - value doesn't come from system prompt, user input, or previous function outputs",
                        key, name, invocation.name, message.index
                    ),
                )
                .at(message.index),
            );
        }
    }
    issues
}
