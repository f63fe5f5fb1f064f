//! Unfilled template text in the system message, the first user message,
//! and every tool invocation's arguments.

use crate::core::config::ValidatorConfig;
use crate::core::report::{CheckName, ValidationIssue};
use crate::core::transcript::{Role, Transcript};
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"YOUR_[A-Z_]+").unwrap(),
        Regex::new(r"(?i)placeholder").unwrap(),
        Regex::new(r"XXX+").unwrap(),
        Regex::new(r"PUT +[A-Z_]+ +HERE").unwrap(),
        Regex::new(r"[A-Z_]+ +HERE\b").unwrap(),
        Regex::new(r"REPLACE_WITH_[A-Z_]+").unwrap(),
        Regex::new(r"\[\[.*?\]\]").unwrap(),
    ]
});

static ANGLE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Z][A-Z0-9_]*)>").unwrap());

/// Where a placeholder was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    SystemMessage,
    UserMessage(usize),
    Arguments { function: String, message_index: usize },
}

impl Location {
    fn message_index(&self) -> usize {
        match self {
            Location::SystemMessage => 0,
            Location::UserMessage(i) => *i,
            Location::Arguments { message_index, .. } => *message_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub matched: String,
    pub location: Location,
}

pub struct PlaceholderScanner<'a> {
    markup_tags: &'a [String],
}

impl<'a> PlaceholderScanner<'a> {
    pub fn new(config: &'a ValidatorConfig) -> Self {
        Self {
            markup_tags: &config.markup_tags,
        }
    }

    /// Every placeholder match in `text`, in pattern order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for re in PLACEHOLDER_PATTERNS.iter() {
            for m in re.find_iter(text) {
                push_unique(&mut found, m.as_str());
            }
        }
        for caps in ANGLE_TOKEN_RE.captures_iter(text) {
            let tag = caps[1].to_lowercase();
            if !self.markup_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                push_unique(&mut found, &caps[0]);
            }
        }
        found
    }

    pub fn is_placeholder(&self, value: &str) -> bool {
        !self.matches(value).is_empty()
    }

    pub fn scan(&self, transcript: &Transcript) -> Vec<Finding> {
        let mut findings = Vec::new();
        if let Some(system) = transcript.messages().first()
            && system.role == Role::System
        {
            for matched in self.matches(system.text()) {
                findings.push(Finding {
                    matched,
                    location: Location::SystemMessage,
                });
            }
        }
        if let Some(user) = transcript.first_user()
            && user.role == Role::User
        {
            for matched in self.matches(user.text()) {
                findings.push(Finding {
                    matched,
                    location: Location::UserMessage(user.index),
                });
            }
        }
        for (message, invocation) in transcript.calls() {
            for matched in self.matches(&invocation.arguments.to_scan_text()) {
                findings.push(Finding {
                    matched,
                    location: Location::Arguments {
                        function: invocation.name.clone(),
                        message_index: message.index,
                    },
                });
            }
        }
        findings
    }
}

/// Skips matches already covered by a longer one (`TOKEN HERE` inside `PUT TOKEN HERE`).
fn push_unique(found: &mut Vec<String>, matched: &str) {
    if !found.iter().any(|f| f.contains(matched)) {
        found.push(matched.to_string());
    }
}

pub fn check(transcript: &Transcript, scanner: &PlaceholderScanner<'_>) -> Vec<ValidationIssue> {
    scanner
        .scan(transcript)
        .into_iter()
        .map(|finding| {
            let message = match &finding.location {
                Location::SystemMessage => {
                    format!("Found placeholder '{}' in system message", finding.matched)
                }
                Location::UserMessage(i) => {
                    format!("Found placeholder '{}' in user message {}", finding.matched, i)
                }
                Location::Arguments {
                    function,
                    message_index,
                } => format!(
                    "Found placeholder '{}' in arguments of function '{}' (message {})",
                    finding.matched, function, message_index
                ),
            };
            ValidationIssue::error(CheckName::PlaceholderCheck, message)
                .at(finding.location.message_index())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scanner_matches(text: &str) -> Vec<String> {
        let config = ValidatorConfig::default();
        PlaceholderScanner::new(&config).matches(text)
    }

    #[test]
    fn test_each_pattern_family() {
        assert_eq!(scanner_matches("key=YOUR_API_KEY"), vec!["YOUR_API_KEY"]);
        assert_eq!(scanner_matches("a Placeholder value"), vec!["Placeholder"]);
        assert_eq!(scanner_matches("card XXXX-1234"), vec!["XXXX"]);
        assert_eq!(scanner_matches("PUT TOKEN HERE"), vec!["PUT TOKEN HERE"]);
        assert_eq!(scanner_matches("REPLACE_WITH_ID"), vec!["REPLACE_WITH_ID"]);
        assert_eq!(scanner_matches("see [[customer name]]"), vec!["[[customer name]]"]);
        assert_eq!(scanner_matches("to: <EMAIL>"), vec!["<EMAIL>"]);
    }

    #[test]
    fn test_placeholder_word_inside_identifier() {
        assert_eq!(scanner_matches("PLACEHOLDER_API_KEY"), vec!["PLACEHOLDER"]);
        assert_eq!(scanner_matches("placeholder_token"), vec!["placeholder"]);
        assert_eq!(scanner_matches("api-key-placeholder"), vec!["placeholder"]);
        assert_eq!(scanner_matches("YOUR_PLACEHOLDER"), vec!["YOUR_PLACEHOLDER"]);
    }

    #[test]
    fn test_markup_tags_and_ordinary_text_pass() {
        assert!(scanner_matches("<B>bold</B> and <P> text <BR>").is_empty());
        assert!(scanner_matches("Order ORD-5512 shipped on 2025-03-01").is_empty());
        assert!(scanner_matches("your_api_key is lowercase").is_empty());
    }

    #[test]
    fn test_scan_locations() {
        let t = Transcript::from_value(&json!({"messages": [
            {"role": "system", "content": "**Objective**: use <TOOL_NAME>"},
            {"role": "user", "content": "Email [[recipient]]"},
            {"role": "cot", "content": "YOUR_PLAN is ignored in cot"},
            {"role": "assistant", "function_call": {"name": "send", "arguments": {"api_key": "YOUR_API_KEY"}}}
        ]}))
        .unwrap();
        let config = ValidatorConfig::default();
        let issues = check(&t, &PlaceholderScanner::new(&config));
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].message_index, Some(0));
        assert_eq!(issues[1].message_index, Some(1));
        assert_eq!(
            issues[2].message,
            "Found placeholder 'YOUR_API_KEY' in arguments of function 'send' (message 3)"
        );
    }
}
