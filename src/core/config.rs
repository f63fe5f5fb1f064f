//! Validator tunables, loaded from `provcheck.toml`.
//!
//! Every field has a default matching the stock transcript conventions, so an
//! absent config file behaves exactly like an empty one.

use crate::core::error::ProvcheckError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "provcheck.toml";

/// Markers the system message must carry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SystemMarkers {
    pub objective: String,
    pub guidelines: String,
    pub available_tools: String,
}

impl Default for SystemMarkers {
    fn default() -> Self {
        Self {
            objective: "**Objective**".to_string(),
            guidelines: "**Guidelines**".to_string(),
            available_tools: "**Available Tools**".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Distinct tools that must be both declared and exercised.
    pub min_distinct_tools: usize,
    pub system_markers: SystemMarkers,
    /// Header introducing the `- Name Token: value` credential lines.
    pub credentials_header: String,
    /// Fail `token_consistency` when the first user message has no credentials section.
    pub require_credentials_section: bool,
    /// Argument names allowed to be untracked by the parameter-flow check.
    pub flow_exempt_params: Vec<String>,
    /// Untracked strings shorter than this are not reported by the parameter-flow check.
    pub flow_min_string_len: usize,
    /// Untracked integers below this are not reported by the parameter-flow check.
    pub flow_min_integer: i64,
    /// Argument names whose values are expected to be freely generated.
    pub hallucination_exempt_params: Vec<String>,
    /// Argument names holding assembled free text (checked by known-element count).
    pub composite_params: Vec<String>,
    pub composite_min_known: usize,
    /// Entity names too generic to demand a user-supplied identifier.
    pub generic_entities: Vec<String>,
    /// Entity names whose identifiers are produced by the system, not the user.
    pub system_entities: Vec<String>,
    /// Lower-case markup tags that are not placeholders when angle-bracketed.
    pub markup_tags: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_distinct_tools: 5,
            system_markers: SystemMarkers::default(),
            credentials_header: "**API Keys and Tokens**".to_string(),
            require_credentials_section: false,
            flow_exempt_params: strings(&[
                "top_p",
                "stop",
                "best_of",
                "prompt",
                "text",
                "message",
                "temperature",
            ]),
            flow_min_string_len: 5,
            flow_min_integer: 1000,
            hallucination_exempt_params: strings(&[
                // sampling knobs
                "temperature",
                "top_p",
                "top_k",
                "max_tokens",
                "frequency_penalty",
                "presence_penalty",
                "best_of",
                "random_seed",
                "seed",
                "stop",
                // email
                "body",
                "email_body",
                "html_body",
                "text_body",
                "content",
                "message_body",
                "email_content",
                "mail_body",
                "body_text",
                "body_html",
                // messaging
                "message",
                "text",
                "message_text",
                "notification_text",
                "sms_text",
                "whatsapp_message",
                "telegram_message",
                // markup
                "html",
                "html_content",
                "markup",
                "template",
                "description",
                "rich_text",
                // other prose
                "summary",
                "comment",
                "note",
                "post",
                "caption",
                "announcement",
                "feedback",
                "review",
                "response",
                "reply",
            ]),
            composite_params: strings(&["prompt"]),
            composite_min_known: 3,
            generic_entities: strings(&[
                "parameter",
                "type",
                "input",
                "output",
                "arg",
                "argument",
                "prop",
                "property",
            ]),
            system_entities: strings(&[
                "session",
                "recording",
                "assignment",
                "document",
                "file",
                "event",
                "meeting",
                "notification",
                "message",
                "announcement",
                "calendar",
                "task",
                "job",
                "process",
            ]),
            markup_tags: strings(&[
                "p", "div", "span", "a", "br", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5",
                "h6", "img", "table", "tr", "td", "th", "code", "pre", "button", "input", "form",
                "strong", "em", "i", "b",
            ]),
        }
    }
}

impl ValidatorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ProvcheckError> {
        let config: ValidatorConfig = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    pub fn is_flow_exempt(&self, param: &str) -> bool {
        contains_ignore_case(&self.flow_exempt_params, param)
    }

    pub fn is_hallucination_exempt(&self, param: &str) -> bool {
        contains_ignore_case(&self.hallucination_exempt_params, param)
    }

    pub fn is_composite(&self, param: &str) -> bool {
        contains_ignore_case(&self.composite_params, param)
    }

    fn check(&self) -> Result<(), ProvcheckError> {
        if self.system_markers.objective.trim().is_empty() {
            return Err(ProvcheckError::ConfigError(
                "system_markers.objective must not be empty".to_string(),
            ));
        }
        if self.credentials_header.trim().is_empty() {
            return Err(ProvcheckError::ConfigError(
                "credentials_header must not be empty".to_string(),
            ));
        }
        if self.composite_min_known == 0 {
            return Err(ProvcheckError::ConfigError(
                "composite_min_known must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `PROVCHECK_*` environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ProvcheckError> {
        if let Ok(raw) = std::env::var("PROVCHECK_MIN_DISTINCT_TOOLS") {
            self.min_distinct_tools = raw.trim().parse().map_err(|_| {
                ProvcheckError::ConfigError(format!(
                    "PROVCHECK_MIN_DISTINCT_TOOLS must be a non-negative integer, got '{}'",
                    raw
                ))
            })?;
        }
        if let Ok(raw) = std::env::var("PROVCHECK_REQUIRE_CREDENTIALS") {
            self.require_credentials_section = matches!(raw.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }
}

fn contains_ignore_case(list: &[String], name: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(name))
}

/// Load config from an explicit path, or `provcheck.toml` under `dir` when present.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<ValidatorConfig, ProvcheckError> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ProvcheckError::NotFound(format!(
                    "config file {}",
                    path.display()
                )));
            }
            let content = fs::read_to_string(path)?;
            ValidatorConfig::from_toml_str(&content)?
        }
        None => {
            let path = dir.join(CONFIG_FILE_NAME);
            if path.exists() {
                let content = fs::read_to_string(&path)?;
                ValidatorConfig::from_toml_str(&content)?
            } else {
                ValidatorConfig::default()
            }
        }
    };
    config.apply_env_overrides()?;
    Ok(config)
}
