//! Role ordering, call/result pairing, system-message markers and tool usage.
//!
//! Three report flags are fed from here: `message_structure` (ordering and
//! pairing), `system_message_validation` (message 0), and
//! `function_validation` (tool coverage, argument schemas, result content).

use crate::core::config::ValidatorConfig;
use crate::core::report::{CheckName, ValidationIssue};
use crate::core::schema::SchemaValidator;
use crate::core::transcript::{Content, Message, Role, ToolCatalog, Transcript};
use serde_json::Value;

/// Position in the role state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqState {
    Start,
    SawSystem,
    SawUser,
    SawCot,
    SawCall,
    SawResult,
    SawAnswer,
    /// A message with an unrecognised role; satisfies no adjacency rule.
    SawUnknown,
}

impl SeqState {
    fn after(self, message: &Message) -> SeqState {
        match &message.role {
            Role::System => SeqState::SawSystem,
            Role::User => SeqState::SawUser,
            Role::Cot => SeqState::SawCot,
            Role::Assistant if message.invocation.is_some() => SeqState::SawCall,
            Role::Assistant => SeqState::SawAnswer,
            Role::Function => SeqState::SawResult,
            Role::Other(_) => SeqState::SawUnknown,
        }
    }
}

fn structure(message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::error(CheckName::MessageStructure, message)
}

/// Ordering and pairing rules; `catalog` is the declared tool set, if any.
pub fn check_structure(
    transcript: &Transcript,
    catalog: Option<&ToolCatalog>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if catalog.is_none() {
        issues.push(structure("Tools are missing"));
    }
    let messages = transcript.messages();
    if messages.is_empty() {
        issues.push(structure("Transcript has no messages"));
        return issues;
    }

    let mut state = SeqState::Start;
    for (i, message) in messages.iter().enumerate() {
        if let Role::Other(raw) = &message.role {
            issues.push(structure(format!("Message {} has unknown role '{}'", i, raw)).at(i));
        }
        if let (Role::Assistant, Some(invocation)) = (&message.role, &message.invocation) {
            if state != SeqState::SawCot {
                issues.push(
                    structure(format!(
                        "Function call for '{}' not preceded by CoT message",
                        invocation.name
                    ))
                    .at(i),
                );
            }
            match messages.get(i + 1) {
                None => issues.push(
                    structure(format!(
                        "Function call for '{}' is the last message (no function result follows)",
                        invocation.name
                    ))
                    .at(i),
                ),
                Some(next)
                    if next.role == Role::Function
                        && next.name.as_deref() == Some(invocation.name.as_str()) => {}
                Some(_) => issues.push(
                    structure(format!(
                        "Function call for '{}' not followed by proper function result",
                        invocation.name
                    ))
                    .at(i),
                ),
            }
        }
        state = state.after(message);
    }

    if let Some(last) = messages.last()
        && last.role != Role::Assistant
    {
        issues.push(structure("Last message is not an assistant message").at(last.index));
    }
    issues
}

/// Message 0 must be the system message carrying every configured marker.
pub fn check_system_message(
    transcript: &Transcript,
    config: &ValidatorConfig,
) -> Vec<ValidationIssue> {
    let issue = |m: String| ValidationIssue::error(CheckName::SystemMessageValidation, m).at(0);
    let Some(first) = transcript.messages().first() else {
        return vec![issue("First message is not a system message".to_string())];
    };
    if first.role != Role::System {
        return vec![issue("First message is not a system message".to_string())];
    }
    let markers = &config.system_markers;
    let text = first.text();
    let mut issues = Vec::new();
    if !text.trim_start().starts_with(&markers.objective) {
        issues.push(issue(format!(
            "System message does not start with '{}'",
            markers.objective
        )));
    }
    if !text.contains(&markers.guidelines) {
        issues.push(issue(format!(
            "System message does not contain '{}'",
            markers.guidelines
        )));
    }
    if !text.contains(&markers.available_tools) {
        issues.push(issue(format!(
            "System message does not contain '{}'",
            markers.available_tools
        )));
    }
    issues
}

fn function_issue(message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::error(CheckName::FunctionValidation, message)
}

/// Tool coverage, declared-name membership, argument schemas and result content.
pub fn check_functions(
    transcript: &Transcript,
    catalog: Option<&ToolCatalog>,
    config: &ValidatorConfig,
    schemas: &dyn SchemaValidator,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let min = config.min_distinct_tools;

    if let Some(catalog) = catalog {
        let declared = catalog.distinct_names().len();
        if declared < min {
            issues.push(function_issue(format!(
                "Need at least {} unique functions in tools; found {}",
                min, declared
            )));
        }
    }

    let mut called: Vec<&str> = Vec::new();
    for (message, invocation) in transcript.calls() {
        if !called.contains(&invocation.name.as_str()) {
            called.push(&invocation.name);
        }
        let declared = catalog.and_then(|c| c.get(&invocation.name));
        if catalog.is_some() && declared.is_none() {
            issues.push(
                function_issue(format!(
                    "Function call '{}' is not available in tools",
                    invocation.name
                ))
                .at(message.index),
            );
        }
        let arguments = match invocation.arguments.parse() {
            Ok(arguments) => arguments,
            Err(e) => {
                issues.push(
                    function_issue(format!(
                        "Invalid arguments for function '{}': could not parse arguments at message {}: {}",
                        invocation.name, message.index, e
                    ))
                    .at(message.index),
                );
                continue;
            }
        };
        if let Some(decl) = declared
            && let Err(reasons) = schemas.check(&decl.parameters, &Value::Object(arguments))
        {
            issues.push(
                function_issue(format!(
                    "Invalid arguments for function '{}': {}",
                    invocation.name,
                    reasons.join("; ")
                ))
                .at(message.index),
            );
        }
    }
    if called.len() < min {
        issues.push(function_issue(format!(
            "Need at least {} unique functions in messages; found {}",
            min,
            called.len()
        )));
    }

    for message in transcript.function_results() {
        let name = message.name.as_deref().unwrap_or_default();
        match &message.content {
            Content::NonText(_) => issues.push(
                function_issue(format!(
                    "Function response for '{}' (message {}) is not a string",
                    name, message.index
                ))
                .at(message.index),
            ),
            Content::Absent => issues.push(
                function_issue(format!(
                    "Function response for '{}' (message {}) is an empty or whitespace-only string",
                    name, message.index
                ))
                .at(message.index),
            ),
            Content::Text(raw) if raw.trim().is_empty() => issues.push(
                function_issue(format!(
                    "Function response for '{}' (message {}) is an empty or whitespace-only string",
                    name, message.index
                ))
                .at(message.index),
            ),
            Content::Text(raw) => {
                if let Err(e) = serde_json::from_str::<Value>(raw) {
                    issues.push(
                        function_issue(format!(
                            "Invalid JSON in function response for '{}' (message {}): {}",
                            name, message.index, e
                        ))
                        .at(message.index),
                    );
                }
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::JsonSchemaValidator;
    use serde_json::json;

    const SYSTEM: &str = "**Objective**: triage\n**Guidelines**: be careful\n**Available Tools**: a, b.";

    fn tools(names: &[&str]) -> Value {
        Value::Array(
            names
                .iter()
                .map(|n| {
                    json!({"type": "function", "function": {
                        "name": n,
                        "description": "tool",
                        "parameters": {"type": "object", "properties": {"limit": {"type": "integer"}}}
                    }})
                })
                .collect(),
        )
    }

    fn transcript(messages: Value) -> Transcript {
        Transcript::from_value(&json!({"tools": tools(&["a", "b"]), "messages": messages})).unwrap()
    }

    fn call(name: &str) -> Value {
        json!({"role": "assistant", "function_call": {"name": name, "arguments": "{}"}})
    }

    fn result(name: &str) -> Value {
        json!({"role": "function", "name": name, "content": "{\"ok\": true}"})
    }

    fn structure_messages(t: &Transcript) -> Vec<String> {
        check_structure(t, t.declared_tools())
            .into_iter()
            .map(|i| i.message)
            .collect()
    }

    #[test]
    fn test_well_ordered_transcript_has_no_structure_issues() {
        let t = transcript(json!([
            {"role": "system", "content": SYSTEM},
            {"role": "user", "content": "go"},
            {"role": "cot", "content": "call a"},
            call("a"),
            result("a"),
            {"role": "cot", "content": "call b"},
            call("b"),
            result("b"),
            {"role": "assistant", "content": "done"}
        ]));
        assert!(structure_messages(&t).is_empty());
        assert!(check_system_message(&t, &ValidatorConfig::default()).is_empty());
    }

    #[test]
    fn test_missing_cot_flags_only_that_call() {
        let t = transcript(json!([
            {"role": "system", "content": SYSTEM},
            {"role": "user", "content": "go"},
            {"role": "cot", "content": "call a"},
            call("a"),
            result("a"),
            call("b"),
            result("b"),
            {"role": "assistant", "content": "done"}
        ]));
        let issues = check_structure(&t, t.declared_tools());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Function call for 'b' not preceded by CoT message");
        assert_eq!(issues[0].message_index, Some(5));
    }

    #[test]
    fn test_adjacent_calls_and_trailing_call() {
        let t = transcript(json!([
            {"role": "system", "content": SYSTEM},
            {"role": "cot", "content": "two at once"},
            call("a"),
            call("b")
        ]));
        assert_eq!(
            structure_messages(&t),
            vec![
                "Function call for 'a' not followed by proper function result",
                "Function call for 'b' not preceded by CoT message",
                "Function call for 'b' is the last message (no function result follows)",
            ]
        );
    }

    #[test]
    fn test_mismatched_result_name_and_last_message() {
        let t = transcript(json!([
            {"role": "system", "content": SYSTEM},
            {"role": "cot", "content": "x"},
            call("a"),
            result("b"),
            {"role": "narrator", "content": "?"}
        ]));
        assert_eq!(
            structure_messages(&t),
            vec![
                "Function call for 'a' not followed by proper function result",
                "Message 4 has unknown role 'narrator'",
                "Last message is not an assistant message",
            ]
        );
    }

    #[test]
    fn test_unknown_role_breaks_cot_adjacency() {
        let t = transcript(json!([
            {"role": "system", "content": SYSTEM},
            {"role": "cot", "content": "x"},
            {"role": "tool", "content": "interleaved"},
            call("a"),
            result("a"),
            {"role": "assistant", "content": "done"}
        ]));
        assert_eq!(
            structure_messages(&t),
            vec![
                "Message 2 has unknown role 'tool'",
                "Function call for 'a' not preceded by CoT message",
            ]
        );
    }

    #[test]
    fn test_missing_tools_and_empty_transcript() {
        let t = Transcript::from_value(&json!({"messages": []})).unwrap();
        assert_eq!(
            structure_messages(&t),
            vec!["Tools are missing", "Transcript has no messages"]
        );
        assert_eq!(check_system_message(&t, &ValidatorConfig::default()).len(), 1);
    }

    #[test]
    fn test_system_markers() {
        let t = transcript(json!([{"role": "system", "content": "Intro\n**Objective**: x"}]));
        let messages: Vec<String> = check_system_message(&t, &ValidatorConfig::default())
            .into_iter()
            .map(|i| i.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "System message does not start with '**Objective**'",
                "System message does not contain '**Guidelines**'",
                "System message does not contain '**Available Tools**'",
            ]
        );
        let t = transcript(json!([{"role": "user", "content": "hi"}]));
        assert_eq!(
            check_system_message(&t, &ValidatorConfig::default())[0].message,
            "First message is not a system message"
        );
    }

    #[test]
    fn test_function_validation_rules() {
        let t = transcript(json!([
            {"role": "system", "content": SYSTEM},
            {"role": "cot", "content": "x"},
            {"role": "assistant", "function_call": {"name": "a", "arguments": {"limit": "ten"}}},
            {"role": "function", "name": "a", "content": "   "},
            {"role": "cot", "content": "x"},
            {"role": "assistant", "function_call": {"name": "zzz", "arguments": "{bad"}},
            {"role": "function", "name": "zzz", "content": "not json"},
            {"role": "function", "name": "a", "content": {"already": "parsed"}}
        ]));
        let config = ValidatorConfig {
            min_distinct_tools: 2,
            ..ValidatorConfig::default()
        };
        let issues: Vec<String> =
            check_functions(&t, t.declared_tools(), &config, &JsonSchemaValidator)
                .into_iter()
                .map(|i| i.message)
                .collect();
        assert_eq!(issues.len(), 6, "{:?}", issues);
        assert!(issues[0].starts_with("Invalid arguments for function 'a':"));
        assert_eq!(issues[1], "Function call 'zzz' is not available in tools");
        assert!(issues[2].contains("could not parse arguments at message 5"));
        assert!(issues[3].ends_with("is an empty or whitespace-only string"));
        assert!(issues[4].starts_with("Invalid JSON in function response for 'zzz' (message 6)"));
        assert_eq!(issues[5], "Function response for 'a' (message 7) is not a string");
    }

    #[test]
    fn test_distinct_tool_minimum() {
        let t = transcript(json!([
            {"role": "system", "content": SYSTEM},
            {"role": "cot", "content": "x"},
            call("a"),
            result("a")
        ]));
        let issues: Vec<String> =
            check_functions(&t, t.declared_tools(), &ValidatorConfig::default(), &JsonSchemaValidator)
                .into_iter()
                .map(|i| i.message)
                .collect();
        assert_eq!(
            issues,
            vec![
                "Need at least 5 unique functions in tools; found 2",
                "Need at least 5 unique functions in messages; found 1",
            ]
        );
    }
}
