//! Declared credentials must not leak into tool arguments.

use crate::core::config::ValidatorConfig;
use crate::core::report::{CheckName, ValidationIssue};
use crate::core::transcript::{Role, Transcript};
use crate::core::value_index::credential_lines;
use rustc_hash::FxHashMap;
use serde_json::Value;

const CREDENTIAL_KEY_PARTS: &[&str] = &["token", "secret", "password", "api_key", "authorization"];

fn is_credential_key(key: &str) -> bool {
    let key = key.to_lowercase();
    CREDENTIAL_KEY_PARTS.iter().any(|part| key.contains(part))
}

/// Declared `(name, value)` pairs from the first user message.
pub fn declared_tokens(
    transcript: &Transcript,
    config: &ValidatorConfig,
) -> Option<Vec<(String, String)>> {
    let user = transcript.first_user().filter(|m| m.role == Role::User)?;
    if !user.text().contains(&config.credentials_header) {
        return None;
    }
    Some(credential_lines(user.text(), &config.credentials_header))
}

pub fn check(transcript: &Transcript, config: &ValidatorConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let tokens = match declared_tokens(transcript, config) {
        Some(tokens) => tokens,
        None => {
            if config.require_credentials_section {
                issues.push(ValidationIssue::error(
                    CheckName::TokenConsistency,
                    format!(
                        "First user message has no '{}' section",
                        config.credentials_header
                    ),
                ));
            }
            Vec::new()
        }
    };

    // (function, argument) -> (first value, message index)
    let mut seen: FxHashMap<(String, String), (String, usize)> = FxHashMap::default();

    for (message, invocation) in transcript.calls() {
        let Ok(arguments) = invocation.arguments.parse() else {
            continue;
        };
        for (key, value) in &arguments {
            for (name, token) in &tokens {
                if key == name || key == token {
                    issues.push(
                        ValidationIssue::error(
                            CheckName::TokenConsistency,
                            format!(
                                "Argument name '{}' in function '{}' (message {}) matches declared token '{}'",
                                key, invocation.name, message.index, name
                            ),
                        )
                        .at(message.index),
                    );
                } else if value.as_str() == Some(name.as_str()) {
                    issues.push(
                        ValidationIssue::error(
                            CheckName::TokenConsistency,
                            format!(
                                "Argument '{}' in function '{}' (message {}) carries the declared token name '{}' instead of its value",
                                key, invocation.name, message.index, name
                            ),
                        )
                        .at(message.index),
                    );
                }
            }

            if !is_credential_key(key) {
                continue;
            }
            let Value::String(current) = value else {
                continue;
            };
            let slot = (invocation.name.clone(), key.clone());
            match seen.get(&slot) {
                Some((first, first_index)) if first != current => {
                    issues.push(
                        ValidationIssue::error(
                            CheckName::TokenConsistency,
                            format!(
                                "Credential argument '{}' of function '{}' changes value between message {} and message {}",
                                key, invocation.name, first_index, message.index
                            ),
                        )
                        .at(message.index),
                    );
                }
                Some(_) => {}
                None => {
                    seen.insert(slot, (current.clone(), message.index));
                }
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transcript(user: &str, calls: Vec<Value>) -> Transcript {
        let mut messages = vec![
            json!({"role": "system", "content": "**Objective**"}),
            json!({"role": "user", "content": user}),
        ];
        for call in calls {
            messages.push(json!({"role": "assistant", "function_call": call}));
        }
        Transcript::from_value(&json!({ "messages": messages })).unwrap()
    }

    const USER: &str = "Sync the repo.\n\n**API Keys and Tokens**:\n- GitHub Token: ghp_abc123\n";

    #[test]
    fn test_missing_section_passes_by_default() {
        let t = transcript("just do it", vec![]);
        assert!(check(&t, &ValidatorConfig::default()).is_empty());
        let strict = ValidatorConfig {
            require_credentials_section: true,
            ..ValidatorConfig::default()
        };
        assert_eq!(check(&t, &strict).len(), 1);
    }

    #[test]
    fn test_token_name_as_argument_key_fails() {
        let t = transcript(
            USER,
            vec![json!({"name": "sync", "arguments": {"GitHub Token": "ghp_abc123"}})],
        );
        let issues = check(&t, &ValidatorConfig::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("matches declared token 'GitHub Token'"));
    }

    #[test]
    fn test_token_name_as_value_fails_but_real_value_passes() {
        let t = transcript(
            USER,
            vec![
                json!({"name": "sync", "arguments": {"auth": "GitHub Token"}}),
                json!({"name": "sync", "arguments": {"auth": "ghp_abc123"}}),
            ],
        );
        let issues = check(&t, &ValidatorConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message_index, Some(2));
    }

    #[test]
    fn test_credential_argument_must_stay_stable() {
        let t = transcript(
            USER,
            vec![
                json!({"name": "sync", "arguments": {"api_token": "ghp_abc123"}}),
                json!({"name": "sync", "arguments": {"api_token": "ghp_abc123"}}),
                json!({"name": "sync", "arguments": {"api_token": "ghp_zzz999"}}),
                json!({"name": "other", "arguments": {"api_token": "ghp_zzz999"}}),
            ],
        );
        let issues = check(&t, &ValidatorConfig::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("between message 2 and message 4"));
    }
}
