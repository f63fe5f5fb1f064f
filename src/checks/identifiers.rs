//! Untracked entity identifiers must be suppliable by the user.
//!
//! Regex-based and permissive: any phrasing that pairs the entity name with a
//! value-shaped token in a user message counts as coverage.

use crate::core::config::ValidatorConfig;
use crate::core::provenance::ParameterFlow;
use crate::core::report::{CheckName, ValidationIssue};
use crate::core::transcript::Transcript;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

static ID_PARAM_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)^(.+)_id$").unwrap(),
        Regex::new(r"(?i)^(.+)id$").unwrap(),
        Regex::new(r"(?i)^id_(.+)$").unwrap(),
    ]
});

static END_CODE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"[.\s]([A-Z0-9]{3,})[.!]?$").unwrap(),
        Regex::new(r"[.\s]([A-Z]{2,}[_\-][0-9]{2,})[.!]?$").unwrap(),
    ]
});

/// Lower-cased entity named by an identifier-shaped argument (`order_id` -> `order`).
pub fn entity_of(param: &str) -> Option<String> {
    ID_PARAM_RES
        .iter()
        .find_map(|re| re.captures(param))
        .map(|caps| caps[1].to_lowercase())
}

fn phrasing_patterns(entity: &str) -> Vec<Regex> {
    let e = regex::escape(entity);
    [
        format!(r"\b{e}\s*(?:id|identifier)?\s*[:#]?\s*([A-Za-z0-9_\-.]+)\b"),
        format!(r"\b(?:id|identifier)?\s*(?:of|for)?\s*{e}\s*[:#]?\s*([A-Za-z0-9_\-.]+)\b"),
        format!(r"\b([A-Za-z0-9_\-.]+)\s*(?:as|is|for)?\s*(?:the)?\s*{e}\s*(?:id|identifier)?\b"),
        format!(r"\b{e}\s*(?:is|=)\s*([A-Za-z0-9_\-.]+)\b"),
    ]
    .iter()
    .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
    .collect()
}

/// Whether any user message supplies a value for `entity`.
pub fn user_supplies(transcript: &Transcript, entity: &str) -> bool {
    let patterns = phrasing_patterns(entity);
    let phrased = transcript
        .user_messages()
        .any(|m| patterns.iter().any(|re| re.is_match(m.text())));
    phrased
        || transcript.user_messages().any(|m| {
            let text = m.text().trim();
            END_CODE_RES.iter().any(|re| re.is_match(text))
        })
}

pub fn check(
    transcript: &Transcript,
    flow: &ParameterFlow,
    config: &ValidatorConfig,
    is_placeholder: impl Fn(&str) -> bool,
) -> Vec<ValidationIssue> {
    // No user messages: nothing to hold identifiers against.
    if transcript.user_messages().next().is_none() {
        return Vec::new();
    }

    // (entity, first argument name, first message index), in first-use order.
    let mut wanted: Vec<(String, String, usize)> = Vec::new();
    for record in &flow.records {
        for argument in record.untracked() {
            let Some(entity) = entity_of(&argument.name) else {
                continue;
            };
            if entity.chars().count() <= 1
                || config.generic_entities.contains(&entity)
                || config.system_entities.contains(&entity)
                || is_placeholder(&argument.key())
            {
                continue;
            }
            if !wanted.iter().any(|(e, _, _)| *e == entity) {
                wanted.push((entity, argument.name.clone(), record.message_index));
            }
        }
    }

    wanted
        .into_iter()
        .filter(|(entity, _, _)| !user_supplies(transcript, entity))
        .map(|(entity, param, message_index)| {
            ValidationIssue::advisory(
                CheckName::UserIdentifierCheck,
                format!(
                    "Function calls use '{}' but no user message provides a {} identifier",
                    param, entity
                ),
            )
            .at(message_index)
        })
        .collect()
}
