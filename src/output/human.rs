#![forbid(unsafe_code)]

//! Human-readable output formatter
//!
//! Findings are grouped by severity (errors, then warnings, then info), each
//! group headed with its count. A summary line always closes the report.

use crate::engine::RunResult;
use crate::rules::Finding;
use crate::types::Severity;
use std::io;
use termcolor::{Buffer, Color, ColorSpec, WriteColor};

/// Human formatter for run results
pub struct HumanFormatter {
    summary_only: bool,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            summary_only: false,
        }
    }

    /// Print only the closing summary block
    pub fn summary_only(mut self, summary_only: bool) -> Self {
        self.summary_only = summary_only;
        self
    }

    /// Render without color, for tests and non-terminal sinks
    pub fn format(&self, result: &RunResult) -> String {
        let mut buffer = Buffer::no_color();
        self.write(result, &mut buffer).ok();
        String::from_utf8_lossy(buffer.as_slice()).into_owned()
    }

    /// Write the report to a color-capable sink
    pub fn write(&self, result: &RunResult, out: &mut dyn WriteColor) -> io::Result<()> {
        if !self.summary_only {
            if result.is_clean() {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                writeln!(out, "✅ No issues detected")?;
                out.reset()?;
            } else {
                for severity in Severity::all() {
                    let group: Vec<&Finding> = result.with_severity(severity).collect();
                    if group.is_empty() {
                        continue;
                    }
                    write_group(out, severity, &group)?;
                }
            }
            writeln!(out)?;
        }
        write_summary(out, result)
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Cyan,
    }
}

fn write_group(out: &mut dyn WriteColor, severity: Severity, group: &[&Finding]) -> io::Result<()> {
    out.set_color(
        ColorSpec::new()
            .set_fg(Some(severity_color(severity)))
            .set_bold(true),
    )?;
    writeln!(
        out,
        "{} ({}):",
        severity.as_str().to_uppercase(),
        group.len()
    )?;
    out.reset()?;

    for finding in group {
        match location_label(finding) {
            Some(location) => writeln!(out, "  - {}: {}", location, finding.message)?,
            None => writeln!(out, "  - {}", finding.message)?,
        }
        if let Some(suggestion) = &finding.suggestion {
            writeln!(out, "    Suggestion: {}", suggestion)?;
        }
    }
    Ok(())
}

/// `path:line (structural)`, with whatever parts the finding has
fn location_label(finding: &Finding) -> Option<String> {
    let location = finding.location.as_ref()?;
    let mut label = location.path.clone();
    if let Some(line) = location.line {
        label.push_str(&format!(":{}", line));
    }
    if let Some(structural) = &location.structural {
        label.push_str(&format!(" ({})", structural));
    }
    Some(label)
}

fn write_summary(out: &mut dyn WriteColor, result: &RunResult) -> io::Result<()> {
    let counts = result.counts();
    let mut spec = ColorSpec::new();
    spec.set_bold(true);
    if result.exit_code != 0 {
        spec.set_fg(Some(Color::Red));
    }
    out.set_color(&spec)?;
    write!(
        out,
        "Summary: {} error(s), {} warning(s), {} info in {} document(s)",
        counts.error,
        counts.warning,
        counts.info,
        result.documents.len()
    )?;
    if result.strict {
        write!(out, " [strict]")?;
    }
    writeln!(out)?;
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DocumentInfo, aggregate};
    use crate::rules::RuleInfo;
    use crate::types::{DocumentKind, RuleFamily, StructuralPath};
    use std::path::Path;

    fn sample() -> RunResult {
        let secret = RuleInfo::new("plain-secret", RuleFamily::Gitops, Severity::Error, "s");
        let task = RuleInfo::new("task-name", RuleFamily::Pipeline, Severity::Warning, "t");
        let short = RuleInfo::new("short-module-name", RuleFamily::Pipeline, Severity::Info, "m");
        let path = StructuralPath::root().item("play", 0).key("tasks").index(1);
        let findings = vec![
            short
                .finding("Short module name used: use ansible.builtin.shell")
                .at("site.yml", Some(7), None),
            task.finding("Task missing name attribute")
                .at("site.yml", Some(6), Some(&path))
                .with_suggestion("Add name: field to describe the task"),
            secret
                .finding("Plain Secret found; use SealedSecrets")
                .at("apps/user/db/secret.yaml", Some(1), None),
        ];
        let documents = vec![DocumentInfo {
            path: "site.yml".to_string(),
            kind: DocumentKind::Pipeline,
            structured: true,
            load_error: None,
        }];
        aggregate(Path::new("/work"), documents, findings, false)
    }

    #[test]
    fn test_groups_in_severity_order() {
        let output = HumanFormatter::new().format(&sample());
        let error = output.find("ERROR (1):").unwrap();
        let warning = output.find("WARNING (1):").unwrap();
        let info = output.find("INFO (1):").unwrap();
        assert!(error < warning && warning < info);
        assert!(output.contains("  - apps/user/db/secret.yaml:1: Plain Secret found; use SealedSecrets"));
        assert!(output.contains("    Suggestion: Add name: field to describe the task"));
        assert!(output.contains("site.yml:6 (play[0].tasks[1])"));
        assert!(
            output
                .trim_end()
                .ends_with("Summary: 1 error(s), 1 warning(s), 1 info in 1 document(s)")
        );
    }

    #[test]
    fn test_clean_run() {
        let result = aggregate(Path::new("/work"), Vec::new(), Vec::new(), true);
        let output = HumanFormatter::new().format(&result);
        assert!(output.starts_with("✅ No issues detected"));
        assert!(output.contains("Summary: 0 error(s), 0 warning(s), 0 info in 0 document(s) [strict]"));
    }

    #[test]
    fn test_summary_only_omits_findings() {
        let output = HumanFormatter::new().summary_only(true).format(&sample());
        assert!(!output.contains("Plain Secret"));
        assert_eq!(output.lines().count(), 1);
        assert!(output.starts_with("Summary: 1 error(s)"));
    }

    #[test]
    fn test_every_finding_is_rendered() {
        let result = sample();
        let output = HumanFormatter::new().format(&result);
        for finding in &result.findings {
            assert!(output.contains(&finding.message), "missing {}", finding.message);
        }
    }
}
