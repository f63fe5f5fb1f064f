//! Console rendering for reports.
//!
//! Keeps per-transcript output bounded: one line per check, then a preview of
//! the issue list.

use crate::core::report::{CheckName, CheckStatus, ValidationReport};
use colored::Colorize;

/// Collapse whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Up to `max_items` compacted messages joined by ` | `.
pub fn preview_messages(messages: &[String], max_items: usize, max_chars: usize) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let shown = messages
        .iter()
        .take(max_items)
        .map(|m| compact_line(m, max_chars))
        .collect::<Vec<_>>()
        .join(" | ");
    if messages.len() > max_items {
        format!("{} (+{} more)", shown, messages.len() - max_items)
    } else {
        shown
    }
}

fn mark(status: CheckStatus) -> String {
    match status {
        CheckStatus::Pass => "pass".green().to_string(),
        CheckStatus::Fail => "FAIL".red().bold().to_string(),
    }
}

/// Console block for one report. `max_issues` bounds the issue list.
pub fn render_report(report: &ValidationReport, max_issues: usize) -> String {
    let mut lines = Vec::new();
    let verdict = if report.passed {
        "PASS".green().bold().to_string()
    } else {
        "FAIL".red().bold().to_string()
    };
    lines.push(format!("validate: {} {}", report.file_path, verdict));
    for check in CheckName::ALL {
        lines.push(format!(
            "validate:   {:<26} {}",
            check.as_str(),
            mark(report.status(check))
        ));
    }
    lines.push(format!(
        "validate:   calls total={} unique={} breakdown={}",
        report.total_function_calls,
        report.unique_functions_called,
        if report.function_call_breakdown.is_empty() {
            "-"
        } else {
            &report.function_call_breakdown
        }
    ));
    if !report.errors.is_empty() {
        for line in report.errors.iter().take(max_issues) {
            lines.push(format!("validate:   - {}", compact_line(line, 160)));
        }
        if report.errors.len() > max_issues {
            lines.push(format!(
                "validate:   (+{} more issues)",
                report.errors.len() - max_issues
            ));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::{CallStats, ValidationIssue};

    #[test]
    fn test_compact_line_collapses_and_truncates() {
        assert_eq!(compact_line("a\n  b\tc", 10), "a b c");
        assert_eq!(compact_line("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_preview_messages_counts_rest() {
        let messages = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        assert_eq!(preview_messages(&messages, 2, 20), "one | two (+1 more)");
        assert_eq!(preview_messages(&[], 2, 20), "");
    }

    #[test]
    fn test_render_report_bounds_issues() {
        colored::control::set_override(false);
        let issues = (0..5)
            .map(|i| ValidationIssue::error(CheckName::MessageStructure, format!("issue {}", i)))
            .collect();
        let report = ValidationReport::new("t.json", issues, &CallStats::default());
        let text = render_report(&report, 2);
        assert!(text.starts_with("validate: t.json FAIL"));
        assert!(text.contains("message_structure"));
        assert!(text.contains("- Message structure: issue 1"));
        assert!(!text.contains("issue 2"));
        assert!(text.contains("(+3 more issues)"));
        assert!(text.contains("breakdown=-"));
    }
}
