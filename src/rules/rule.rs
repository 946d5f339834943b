#![forbid(unsafe_code)]

//! Core Rule traits and the finding types they produce

use crate::document::{Document, LineScanner, Node};
use crate::engine::external::FileLister;
use crate::engine::file_walker::SkipPolicy;
use crate::types::{DocumentKind, RuleFamily, RuleId, Severity, StructuralPath};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;

/// Static description of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInfo {
    pub id: RuleId,
    /// `None` for core rules that belong to no toggleable family
    pub family: Option<RuleFamily>,
    /// Default severity of the rule's findings
    pub severity: Severity,
    pub description: &'static str,
}

impl RuleInfo {
    pub(crate) fn new(
        id: &'static str,
        family: RuleFamily,
        severity: Severity,
        description: &'static str,
    ) -> Self {
        Self {
            id: RuleId::from_static(id),
            family: Some(family),
            severity,
            description,
        }
    }

    pub(crate) fn core(id: &'static str, severity: Severity, description: &'static str) -> Self {
        Self {
            id: RuleId::from_static(id),
            family: None,
            severity,
            description,
        }
    }

    /// Finding with this rule's id and default severity
    pub fn finding(&self, message: impl Into<String>) -> Finding {
        Finding {
            severity: self.severity,
            rule_id: self.id.clone(),
            message: message.into(),
            location: None,
            suggestion: None,
        }
    }
}

/// Where a finding points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    /// Repo-relative path
    pub path: String,
    /// 1-based line
    pub line: Option<u32>,
    /// Breadcrumb inside the document tree
    pub structural: Option<String>,
}

/// One reported violation or note
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub rule_id: RuleId,
    pub message: String,
    pub location: Option<Location>,
    /// Short remediation hint shown in human output
    pub suggestion: Option<String>,
}

impl Finding {
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach a location at `path`
    pub fn at(mut self, path: impl Into<String>, line: Option<u32>, structural: Option<&StructuralPath>) -> Self {
        self.location = Some(Location {
            path: path.into(),
            line,
            structural: structural
                .filter(|s| !s.is_root())
                .map(|s| s.as_str().to_string()),
        });
        self
    }

    pub fn path(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.path.as_str())
    }

    pub fn line(&self) -> Option<u32> {
        self.location.as_ref().and_then(|l| l.line)
    }

    /// Report order: path, line, structural path, rule id, message
    pub fn report_order(&self, other: &Finding) -> Ordering {
        let key = |f: &Finding| {
            (
                f.location.as_ref().map(|l| l.path.clone()),
                f.line(),
                f.location.as_ref().and_then(|l| l.structural.clone()),
            )
        };
        key(self)
            .cmp(&key(other))
            .then_with(|| self.rule_id.cmp(&other.rule_id))
            .then_with(|| self.message.cmp(&other.message))
    }
}

/// What a rule is looking at
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    /// A sub-tree of a parsed document
    Node(&'a Node),
    /// The raw lines of the whole document
    Lines(&'a LineScanner),
}

/// Execution context provided to document rules
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub document: &'a Document,
    pub view: View<'a>,
    /// Breadcrumb of the current sub-tree
    pub path: StructuralPath,
    pub strict: bool,
}

impl<'a> RuleContext<'a> {
    /// Finding located at the current sub-tree
    pub fn locate(&self, finding: Finding, line: Option<u32>) -> Finding {
        let line = line.or(match self.view {
            View::Node(node) => node.line,
            View::Lines(_) => None,
        });
        finding.at(self.document.rel_path.clone(), line, Some(&self.path))
    }

    pub fn node(&self) -> Option<&'a Node> {
        match self.view {
            View::Node(node) => Some(node),
            View::Lines(_) => None,
        }
    }

    pub fn lines(&self) -> Option<&'a LineScanner> {
        match self.view {
            View::Lines(lines) => Some(lines),
            View::Node(_) => None,
        }
    }
}

/// Trait for rules evaluated against one document
///
/// Rules are pure: they never mutate the document and never observe another
/// rule's output. A shape a rule does not understand yields no finding.
/// The trait is `Send + Sync` to enable parallel execution across files.
pub trait Rule: Send + Sync {
    fn info(&self) -> &RuleInfo;

    /// Document kinds this rule applies to
    fn kinds(&self) -> &[DocumentKind];

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding>;

    fn id(&self) -> &RuleId {
        &self.info().id
    }

    fn severity(&self) -> Severity {
        self.info().severity
    }
}

/// Execution context for repository-level rules
pub struct RepoContext<'a> {
    pub root: &'a Path,
    pub strict: bool,
    /// Lists tracked files when available
    pub lister: &'a dyn FileLister,
    pub skip: &'a SkipPolicy,
}

/// Trait for rules that look at the repository as a whole (layout, required files)
pub trait RepoRule: Send + Sync {
    fn info(&self) -> &RuleInfo;

    fn evaluate(&self, ctx: &RepoContext<'_>) -> Vec<Finding>;

    fn id(&self) -> &RuleId {
        &self.info().id
    }
}
