//! Validation issues and the per-transcript report.

use serde::Serialize;
use std::fmt;

/// The named checks, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    SchemaValidation,
    PlaceholderCheck,
    TokenConsistency,
    ParameterFlowCheck,
    HallucinationCheck,
    UserIdentifierCheck,
    SystemMessageValidation,
    FunctionValidation,
    MessageStructure,
}

impl CheckName {
    pub const ALL: [CheckName; 9] = [
        CheckName::SchemaValidation,
        CheckName::PlaceholderCheck,
        CheckName::TokenConsistency,
        CheckName::ParameterFlowCheck,
        CheckName::HallucinationCheck,
        CheckName::UserIdentifierCheck,
        CheckName::SystemMessageValidation,
        CheckName::FunctionValidation,
        CheckName::MessageStructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::SchemaValidation => "schema_validation",
            CheckName::PlaceholderCheck => "placeholder_check",
            CheckName::TokenConsistency => "token_consistency",
            CheckName::ParameterFlowCheck => "parameter_flow_check",
            CheckName::HallucinationCheck => "hallucination_check",
            CheckName::UserIdentifierCheck => "user_identifier_check",
            CheckName::SystemMessageValidation => "system_message_validation",
            CheckName::FunctionValidation => "function_validation",
            CheckName::MessageStructure => "message_structure",
        }
    }

    /// Prefix used in human-readable issue lines.
    pub fn label(&self) -> &'static str {
        match self {
            CheckName::SchemaValidation => "Schema validation",
            CheckName::PlaceholderCheck => "Placeholder check",
            CheckName::TokenConsistency => "Token consistency",
            CheckName::ParameterFlowCheck => "Parameter flow",
            CheckName::HallucinationCheck => "Hallucination",
            CheckName::UserIdentifierCheck => "User identifiers",
            CheckName::SystemMessageValidation => "System message",
            CheckName::FunctionValidation => "Function validation",
            CheckName::MessageStructure => "Message structure",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Informational only; any issue fails its check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Structural, schema and parse failures.
    Error,
    /// Heuristic findings that may over- or under-flag.
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub check: CheckName,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_index: Option<usize>,
}

impl ValidationIssue {
    pub fn error(check: CheckName, message: impl Into<String>) -> Self {
        Self {
            check,
            severity: Severity::Error,
            message: message.into(),
            message_index: None,
        }
    }

    pub fn advisory(check: CheckName, message: impl Into<String>) -> Self {
        Self {
            check,
            severity: Severity::Advisory,
            message: message.into(),
            message_index: None,
        }
    }

    pub fn at(mut self, message_index: usize) -> Self {
        self.message_index = Some(message_index);
        self
    }

    /// `"<Check label>: <message>"`.
    pub fn line(&self) -> String {
        format!("{}: {}", self.check.label(), self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    Pass,
    Fail,
}

impl CheckStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, CheckStatus::Pass)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "Pass"),
            CheckStatus::Fail => write!(f, "Fail"),
        }
    }
}

/// Tool-invocation counts, in first-call order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStats {
    pub breakdown: Vec<(String, usize)>,
}

impl CallStats {
    pub fn record(&mut self, name: &str) {
        match self.breakdown.iter_mut().find(|(n, _)| n == name) {
            Some((_, count)) => *count += 1,
            None => self.breakdown.push((name.to_string(), 1)),
        }
    }

    pub fn total(&self) -> usize {
        self.breakdown.iter().map(|(_, c)| c).sum()
    }

    pub fn unique(&self) -> usize {
        self.breakdown.len()
    }

    /// `"name:count; name:count"`.
    pub fn breakdown_string(&self) -> String {
        self.breakdown
            .iter()
            .map(|(name, count)| format!("{}:{}", name, count))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub file_path: String,
    pub passed: bool,
    pub schema_validation: CheckStatus,
    pub placeholder_check: CheckStatus,
    pub token_consistency: CheckStatus,
    pub parameter_flow_check: CheckStatus,
    pub hallucination_check: CheckStatus,
    pub user_identifier_check: CheckStatus,
    pub system_message_validation: CheckStatus,
    pub function_validation: CheckStatus,
    pub message_structure: CheckStatus,
    pub total_function_calls: usize,
    pub unique_functions_called: usize,
    pub function_call_breakdown: String,
    pub errors: Vec<String>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(file_path: &str, issues: Vec<ValidationIssue>, stats: &CallStats) -> Self {
        let status = |check: CheckName| {
            if issues.iter().any(|i| i.check == check) {
                CheckStatus::Fail
            } else {
                CheckStatus::Pass
            }
        };
        let mut report = Self {
            file_path: file_path.to_string(),
            passed: false,
            schema_validation: status(CheckName::SchemaValidation),
            placeholder_check: status(CheckName::PlaceholderCheck),
            token_consistency: status(CheckName::TokenConsistency),
            parameter_flow_check: status(CheckName::ParameterFlowCheck),
            hallucination_check: status(CheckName::HallucinationCheck),
            user_identifier_check: status(CheckName::UserIdentifierCheck),
            system_message_validation: status(CheckName::SystemMessageValidation),
            function_validation: status(CheckName::FunctionValidation),
            message_structure: status(CheckName::MessageStructure),
            total_function_calls: stats.total(),
            unique_functions_called: stats.unique(),
            function_call_breakdown: stats.breakdown_string(),
            errors: issues.iter().map(ValidationIssue::line).collect(),
            issues,
        };
        report.passed = CheckName::ALL.iter().all(|c| report.status(*c).is_pass());
        report
    }

    pub fn status(&self, check: CheckName) -> CheckStatus {
        match check {
            CheckName::SchemaValidation => self.schema_validation,
            CheckName::PlaceholderCheck => self.placeholder_check,
            CheckName::TokenConsistency => self.token_consistency,
            CheckName::ParameterFlowCheck => self.parameter_flow_check,
            CheckName::HallucinationCheck => self.hallucination_check,
            CheckName::UserIdentifierCheck => self.user_identifier_check,
            CheckName::SystemMessageValidation => self.system_message_validation,
            CheckName::FunctionValidation => self.function_validation,
            CheckName::MessageStructure => self.message_structure,
        }
    }

    pub fn failed_checks(&self) -> Vec<CheckName> {
        CheckName::ALL
            .into_iter()
            .filter(|c| !self.status(*c).is_pass())
            .collect()
    }

    pub fn issues_for(&self, check: CheckName) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.check == check)
    }
}
