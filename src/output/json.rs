#![forbid(unsafe_code)]

//! JSON output formatter for machine-readable output
//!
//! Emits one pretty-printed object:
//!
//! ```json
//! {
//!   "repo": "/work/infra",
//!   "issues": [
//!     { "severity": "warning", "message": "...", "path": "site.yml" }
//!   ]
//! }
//! ```
//!
//! Issues keep the aggregator's report order, so two runs over an unchanged
//! tree print byte-identical documents.

use crate::engine::RunResult;
use serde::Serialize;

/// JSON output formatter
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        JsonFormatter
    }

    /// Format the run result as a single JSON document, newline-terminated
    ///
    /// # Errors
    ///
    /// Returns the serializer error; the records only hold strings, so this
    /// does not happen in practice.
    pub fn format(&self, result: &RunResult) -> Result<String, serde_json::Error> {
        let report = Report {
            repo: result.repo.display().to_string(),
            issues: result
                .findings
                .iter()
                .map(|finding| IssueRecord {
                    severity: finding.severity.as_str(),
                    message: &finding.message,
                    path: finding.path(),
                })
                .collect(),
        };
        let mut output = serde_json::to_string_pretty(&report)?;
        output.push('\n');
        Ok(output)
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    repo: String,
    issues: Vec<IssueRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct IssueRecord<'a> {
    severity: &'static str,
    message: &'a str,
    path: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregate;
    use crate::rules::RuleInfo;
    use crate::types::{RuleFamily, Severity};
    use serde_json::Value;
    use std::path::Path;

    #[test]
    fn test_empty_result_is_well_formed() {
        let result = aggregate(Path::new("/work/infra"), Vec::new(), Vec::new(), false);
        let output = JsonFormatter::new().format(&result).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["repo"], "/work/infra");
        assert_eq!(value["issues"], Value::Array(Vec::new()));
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_issue_fields() {
        let pin = RuleInfo::new("action-pin", RuleFamily::Workflow, Severity::Warning, "pin");
        let history = RuleInfo::new("history-file", RuleFamily::Documentation, Severity::Warning, "h");
        let findings = vec![
            pin.finding("Action not pinned to SHA: actions/checkout@v4").at(
                ".github/workflows/ci.yml",
                Some(4),
                None,
            ),
            history.finding("docs/history.md missing (used to document tag usage/exceptions)"),
        ];
        let result = aggregate(Path::new("/work/infra"), Vec::new(), findings, false);
        let value: Value =
            serde_json::from_str(&JsonFormatter::new().format(&result).unwrap()).unwrap();

        let issues = value["issues"].as_array().unwrap();
        assert_eq!(issues.len(), 2);
        // Findings without a location sort first
        assert_eq!(issues[0]["path"], Value::Null);
        assert_eq!(issues[1]["severity"], "warning");
        assert_eq!(issues[1]["path"], ".github/workflows/ci.yml");
        assert_eq!(
            issues[1]["message"],
            "Action not pinned to SHA: actions/checkout@v4"
        );
        // Only the three documented keys
        assert_eq!(issues[1].as_object().unwrap().len(), 3);
    }
}
