#![forbid(unsafe_code)]

//! Core domain types for infraguard
//!
//! This module defines the fundamental types used throughout the guard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Finding severity levels
///
/// Ordering follows report order: errors first, then warnings, then info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// All severities in report order
    pub fn all() -> [Severity; 3] {
        [Severity::Error, Severity::Warning, Severity::Info]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dialect of a scanned file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    /// Ansible playbooks and role task files
    Pipeline,
    /// Kubernetes / Argo CD manifests
    Manifest,
    /// CI workflow definitions (GitHub / Gitea Actions)
    Workflow,
    /// Container build files
    Dockerfile,
    /// Helm chart values files
    ChartValues,
    /// Terraform sources under `terraform/`
    Terraform,
}

impl DocumentKind {
    pub fn all() -> [DocumentKind; 6] {
        [
            DocumentKind::Pipeline,
            DocumentKind::Manifest,
            DocumentKind::Workflow,
            DocumentKind::Dockerfile,
            DocumentKind::ChartValues,
            DocumentKind::Terraform,
        ]
    }

    /// Whether documents of this kind are parsed as YAML
    pub fn is_yaml(&self) -> bool {
        !matches!(self, DocumentKind::Dockerfile | DocumentKind::Terraform)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pipeline => "pipeline",
            DocumentKind::Manifest => "manifest",
            DocumentKind::Workflow => "workflow",
            DocumentKind::Dockerfile => "dockerfile",
            DocumentKind::ChartValues => "chart-values",
            DocumentKind::Terraform => "terraform",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independently toggleable group of rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleFamily {
    Pipeline,
    Gitops,
    Workflow,
    BuildFile,
    ChartValues,
    Documentation,
    Terraform,
    SensitiveFiles,
}

impl RuleFamily {
    pub fn all() -> [RuleFamily; 8] {
        [
            RuleFamily::Pipeline,
            RuleFamily::Gitops,
            RuleFamily::Workflow,
            RuleFamily::BuildFile,
            RuleFamily::ChartValues,
            RuleFamily::Documentation,
            RuleFamily::Terraform,
            RuleFamily::SensitiveFiles,
        ]
    }

    /// Families bundled by the `supply-chain` command
    pub fn supply_chain() -> Vec<RuleFamily> {
        vec![
            RuleFamily::Workflow,
            RuleFamily::BuildFile,
            RuleFamily::ChartValues,
            RuleFamily::Documentation,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleFamily::Pipeline => "pipeline",
            RuleFamily::Gitops => "gitops",
            RuleFamily::Workflow => "workflow",
            RuleFamily::BuildFile => "build-file",
            RuleFamily::ChartValues => "chart-values",
            RuleFamily::Documentation => "documentation",
            RuleFamily::Terraform => "terraform",
            RuleFamily::SensitiveFiles => "sensitive-files",
        }
    }
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kebab-case rule name such as `plain-secret`, used in config keys and findings
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleId(String);

impl RuleId {
    /// `None` unless `id` is a non-empty run of letters, digits, `-` and `_`
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
        valid.then_some(RuleId(id))
    }

    /// Builds a RuleId from a compile-time constant known to be valid
    pub(crate) fn from_static(id: &'static str) -> Self {
        debug_assert!(RuleId::new(id).is_some(), "invalid builtin rule id {id}");
        RuleId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RuleId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RuleId::new(value.as_str()).ok_or_else(|| format!("Invalid rule id '{}'", value))
    }
}

impl From<RuleId> for String {
    fn from(rule_id: RuleId) -> Self {
        rule_id.0
    }
}

/// Glob over repo-relative paths or file names, compiled with globset where used
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobPattern(String);

impl GlobPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        GlobPattern(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GlobPattern {
    fn from(pattern: &str) -> Self {
        GlobPattern(pattern.to_string())
    }
}

/// Breadcrumb locating a node inside a document tree, e.g. `play[0].tasks[2].block[1]`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructuralPath(String);

impl StructuralPath {
    pub fn root() -> Self {
        StructuralPath(String::new())
    }

    /// Extends the path with a mapping key
    pub fn key(&self, key: &str) -> Self {
        if self.0.is_empty() {
            StructuralPath(key.to_string())
        } else {
            StructuralPath(format!("{}.{}", self.0, key))
        }
    }

    /// Extends the path with a sequence index
    pub fn index(&self, idx: usize) -> Self {
        StructuralPath(format!("{}[{}]", self.0, idx))
    }

    /// Extends the path with a named, indexed segment (`play[0]`)
    pub fn item(&self, name: &str, idx: usize) -> Self {
        self.key(name).index(idx)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_id_validation() {
        assert!(RuleId::new("plain-secret").is_some());
        assert!(RuleId::new("rule_123").is_some());
        assert!(RuleId::new("").is_none());
        assert!(RuleId::new("no spaces").is_none());
        assert!(RuleId::new("image@pin").is_none());
        assert!(RuleId::new("régle").is_none());
    }

    #[test]
    fn test_severity_order_matches_report_order() {
        let mut severities = vec![Severity::Info, Severity::Error, Severity::Warning];
        severities.sort();
        assert_eq!(severities, Severity::all().to_vec());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }

    #[test]
    fn test_structural_path_building() {
        let path = StructuralPath::root().item("play", 0).key("tasks").index(2);
        assert_eq!(path.as_str(), "play[0].tasks[2]");

        let nested = path.key("block").index(1);
        assert_eq!(nested.as_str(), "play[0].tasks[2].block[1]");

        assert_eq!(StructuralPath::root().key("image").as_str(), "image");
        assert!(StructuralPath::root().is_root());
    }

    #[test]
    fn test_document_kind_yaml() {
        assert!(DocumentKind::Pipeline.is_yaml());
        assert!(DocumentKind::ChartValues.is_yaml());
        assert!(!DocumentKind::Dockerfile.is_yaml());
        assert!(!DocumentKind::Terraform.is_yaml());
    }

    #[test]
    fn test_family_names_are_kebab_case() {
        for family in RuleFamily::all() {
            let json = serde_json::to_string(&family).unwrap();
            assert_eq!(json, format!("\"{}\"", family.as_str()));
        }
    }
}
