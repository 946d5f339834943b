//! Finding aggregation and exit-code computation

use crate::rules::Finding;
use crate::types::{DocumentKind, Severity};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// No findings that fail the run
pub const EXIT_CLEAN: i32 = 0;
/// Error findings, or any finding under strict mode
pub const EXIT_FINDINGS: i32 = 1;

/// What the run learned about one scanned document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub path: String,
    pub kind: DocumentKind,
    /// Whether rules saw a parsed tree rather than raw lines
    pub structured: bool,
    pub load_error: Option<String>,
}

/// Number of findings per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }
}

/// Outcome of one guard run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub repo: PathBuf,
    /// Scanned documents, sorted by path
    pub documents: Vec<DocumentInfo>,
    /// Findings in report order
    pub findings: Vec<Finding>,
    pub strict: bool,
    pub exit_code: i32,
}

impl RunResult {
    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for finding in &self.findings {
            match finding.severity {
                Severity::Error => counts.error += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    /// Findings of one severity, keeping report order
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Exit code for a set of findings
///
/// Any Error fails the run. Without errors, strict mode fails on any finding.
pub fn exit_code(findings: &[Finding], strict: bool) -> i32 {
    if findings.iter().any(|f| f.severity == Severity::Error) {
        return EXIT_FINDINGS;
    }
    if strict && !findings.is_empty() {
        return EXIT_FINDINGS;
    }
    EXIT_CLEAN
}

/// Merge the results of a run into their reported order
pub fn aggregate(
    repo: &Path,
    mut documents: Vec<DocumentInfo>,
    mut findings: Vec<Finding>,
    strict: bool,
) -> RunResult {
    documents.sort_by(|a, b| a.path.cmp(&b.path));
    findings.sort_by(|a, b| a.report_order(b));
    let exit_code = exit_code(&findings, strict);
    RunResult {
        repo: repo.to_path_buf(),
        documents,
        findings,
        strict,
        exit_code,
    }
}
