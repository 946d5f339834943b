//! Manifest and repository-layout rules for the GitOps tree

use crate::config::GitopsPolicy;
use crate::document::{Document, LineScanner, Node, NodeKind, has_segment_run};
use crate::rules::rule::{Finding, RepoContext, RepoRule, Rule, RuleContext, RuleInfo};
use crate::types::{DocumentKind, RuleFamily, Severity};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

const KINDS: &[DocumentKind] = &[DocumentKind::Manifest];

static SECRET_KIND_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^kind:\s*Secret\b").expect("secret kind regex is valid"));
static SEALED_KIND_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^kind:\s*SealedSecret\b").expect("sealed secret kind regex is valid")
});
static APPLICATION_KIND_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^kind:\s*Application(Set)?\b").expect("application kind regex is valid")
});
static CHART_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*chart:\s*\S+").expect("chart regex is valid"));

/// Document rules built from the policy tables
pub fn rules(policy: &GitopsPolicy) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(PlainSecretRule::new()),
        Box::new(SkipReconcileRule::new(policy)),
        Box::new(ApplicationPathRule::new(policy)),
        Box::new(ApplicationLabelRule::new(policy)),
        Box::new(ApplicationChartRule::new()),
    ]
}

/// Repository layout rules built from the policy tables
pub fn repo_rules(policy: &GitopsPolicy) -> Vec<Box<dyn RepoRule>> {
    vec![
        Box::new(AppsLayoutRule::new(policy)),
        Box::new(EnvironmentOverlayRule::new(policy)),
    ]
}

fn kind_of(doc: &Node) -> Option<&str> {
    doc.get("kind").and_then(Node::as_str)
}

fn is_application(doc: &Node) -> bool {
    matches!(kind_of(doc), Some("Application" | "ApplicationSet"))
}

fn kind_line(doc: &Node) -> Option<u32> {
    doc.get("kind").and_then(|k| k.line)
}

/// First node under `key` anywhere in the tree, depth first
fn find_key<'a>(node: &'a Node, key: &str) -> Option<&'a Node> {
    match &node.kind {
        NodeKind::Mapping(mapping) => mapping.iter().find_map(|(k, value)| {
            if k == key {
                Some(value)
            } else {
                find_key(value, key)
            }
        }),
        NodeKind::Sequence(items) => items.iter().find_map(|item| find_key(item, key)),
        NodeKind::Scalar(_) | NodeKind::Null => None,
    }
}

/// Lines declaring an Argo CD Application kind
fn application_lines(document: &Document) -> Vec<u32> {
    document
        .lines
        .matching(&APPLICATION_KIND_LINE)
        .map(|(n, _)| n)
        .collect()
}

pub struct PlainSecretRule {
    info: RuleInfo,
}

impl PlainSecretRule {
    pub fn new() -> Self {
        Self {
            info: RuleInfo::new(
                "plain-secret",
                RuleFamily::Gitops,
                Severity::Error,
                "Plain Secret manifests must be sealed before they are committed",
            ),
        }
    }

    fn file_has_sealed_secret(document: &Document) -> bool {
        match &document.trees {
            Some(trees) => trees.iter().any(|t| kind_of(t) == Some("SealedSecret")),
            None => document.lines.is_match(&SEALED_KIND_LINE),
        }
    }

    fn finding(&self) -> Finding {
        self.info.finding("Plain Secret found; use SealedSecrets")
    }
}

impl Default for PlainSecretRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for PlainSecretRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if let Some(doc) = ctx.node() {
            if kind_of(doc) != Some("Secret") || Self::file_has_sealed_secret(ctx.document) {
                return Vec::new();
            }
            return vec![ctx.locate(self.finding(), kind_line(doc))];
        }

        let Some(lines) = ctx.lines() else {
            return Vec::new();
        };
        if Self::file_has_sealed_secret(ctx.document) {
            return Vec::new();
        }
        lines
            .matching(&SECRET_KIND_LINE)
            .map(|(n, _)| ctx.locate(self.finding(), Some(n)))
            .collect()
    }
}

pub struct SkipReconcileRule {
    info: RuleInfo,
    annotation: String,
}

impl SkipReconcileRule {
    pub fn new(policy: &GitopsPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "skip-reconcile",
                RuleFamily::Gitops,
                Severity::Warning,
                "Manifests that opt out of reconciliation drift silently",
            ),
            annotation: policy.skip_reconcile_annotation.clone(),
        }
    }

    fn finding(&self) -> Finding {
        self.info
            .finding("skip-reconcile annotation present (recovery-only)")
    }
}

impl Rule for SkipReconcileRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if let Some(doc) = ctx.node() {
            return match find_key(doc, &self.annotation) {
                Some(value) => vec![ctx.locate(self.finding(), value.line)],
                None => Vec::new(),
            };
        }
        let Some(lines) = ctx.lines() else {
            return Vec::new();
        };
        lines
            .containing(&self.annotation)
            .next()
            .map(|(n, _)| ctx.locate(self.finding(), Some(n)))
            .into_iter()
            .collect()
    }
}

pub struct ApplicationPathRule {
    info: RuleInfo,
    allowed_dirs: Vec<String>,
}

impl ApplicationPathRule {
    pub fn new(policy: &GitopsPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "application-path",
                RuleFamily::Gitops,
                Severity::Error,
                "Argo CD Applications live only in the application directories",
            ),
            allowed_dirs: policy.application_dirs.clone(),
        }
    }

    fn in_allowed_dir(&self, rel_path: &str) -> bool {
        let parent = rel_path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        self.allowed_dirs
            .iter()
            .any(|dir| has_segment_run(parent, dir))
    }

    fn finding(&self) -> Finding {
        self.info.finding(format!(
            "ArgoCD Application manifest outside allowed directories: {}",
            self.allowed_dirs.join(", ")
        ))
    }
}

impl Rule for ApplicationPathRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if self.in_allowed_dir(&ctx.document.rel_path) {
            return Vec::new();
        }
        if let Some(doc) = ctx.node() {
            if !is_application(doc) {
                return Vec::new();
            }
            return vec![ctx.locate(self.finding(), kind_line(doc))];
        }
        if ctx.lines().is_none() {
            return Vec::new();
        }
        application_lines(ctx.document)
            .into_iter()
            .map(|n| ctx.locate(self.finding(), Some(n)))
            .collect()
    }
}

pub struct ApplicationLabelRule {
    info: RuleInfo,
    label: String,
    value: String,
}

impl ApplicationLabelRule {
    pub fn new(policy: &GitopsPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "application-label",
                RuleFamily::Gitops,
                Severity::Error,
                "Argo CD Applications carry the ownership label",
            ),
            label: policy.ownership_label.clone(),
            value: policy.ownership_value.clone(),
        }
    }

    fn finding(&self) -> Finding {
        self.info.finding(format!(
            "ArgoCD Application missing {}: {} label",
            self.label, self.value
        ))
    }
}

impl Rule for ApplicationLabelRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if let Some(doc) = ctx.node() {
            if !is_application(doc) {
                return Vec::new();
            }
            let labelled = doc
                .get_path(&["metadata", "labels"])
                .and_then(|labels| labels.get(&self.label))
                .and_then(Node::scalar_text)
                .is_some_and(|v| v == self.value);
            if labelled {
                return Vec::new();
            }
            return vec![ctx.locate(self.finding(), kind_line(doc))];
        }

        let Some(lines) = ctx.lines() else {
            return Vec::new();
        };
        let labelled = lines
            .iter()
            .filter_map(|(_, line)| LineScanner::key_value(line))
            .any(|(key, value)| key == self.label && value == self.value);
        if labelled {
            return Vec::new();
        }
        application_lines(ctx.document)
            .into_iter()
            .map(|n| ctx.locate(self.finding(), Some(n)))
            .collect()
    }
}

pub struct ApplicationChartRule {
    info: RuleInfo,
}

impl ApplicationChartRule {
    pub fn new() -> Self {
        Self {
            info: RuleInfo::new(
                "application-chart",
                RuleFamily::Gitops,
                Severity::Error,
                "Applications deploy wrapper charts from the repository, not remote charts",
            ),
        }
    }

    fn finding(&self) -> Finding {
        self.info
            .finding("ArgoCD Application uses chart: (direct Helm repo); use wrapper chart path")
    }
}

impl Default for ApplicationChartRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ApplicationChartRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if let Some(doc) = ctx.node() {
            if !is_application(doc) {
                return Vec::new();
            }
            let chart = find_key(doc, "chart")
                .filter(|c| c.scalar_text().is_some_and(|t| !t.trim().is_empty()));
            return match chart {
                Some(chart) => vec![ctx.locate(self.finding(), chart.line)],
                None => Vec::new(),
            };
        }

        let Some(lines) = ctx.lines() else {
            return Vec::new();
        };
        if application_lines(ctx.document).is_empty() {
            return Vec::new();
        }
        lines
            .matching(&CHART_LINE)
            .next()
            .map(|(n, _)| ctx.locate(self.finding(), Some(n)))
            .into_iter()
            .collect()
    }
}

/// Sorted names of the sub-directories of `dir`
fn child_dirs(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|ft| ft.is_dir()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub struct AppsLayoutRule {
    info: RuleInfo,
    apps_dir: String,
    allowed: Vec<String>,
}

impl AppsLayoutRule {
    pub fn new(policy: &GitopsPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "apps-layout",
                RuleFamily::Gitops,
                Severity::Error,
                "Only the known top-level directories may exist under apps/",
            ),
            apps_dir: policy.apps_dir.clone(),
            allowed: policy.allowed_apps_children.clone(),
        }
    }
}

impl RepoRule for AppsLayoutRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &RepoContext<'_>) -> Vec<Finding> {
        child_dirs(&ctx.root.join(&self.apps_dir))
            .into_iter()
            .filter(|name| !self.allowed.contains(name))
            .map(|name| {
                self.info
                    .finding(format!("Unexpected {}/ child directory: {}", self.apps_dir, name))
                    .at(format!("{}/{}", self.apps_dir, name), None, None)
            })
            .collect()
    }
}

pub struct EnvironmentOverlayRule {
    info: RuleInfo,
    environments_dir: String,
    allowed: Vec<String>,
}

impl EnvironmentOverlayRule {
    pub fn new(policy: &GitopsPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "environment-overlay",
                RuleFamily::Gitops,
                Severity::Error,
                "Only the allowed environment overlays may exist",
            ),
            environments_dir: policy.environments_dir.clone(),
            allowed: policy.allowed_environments.clone(),
        }
    }
}

impl RepoRule for EnvironmentOverlayRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &RepoContext<'_>) -> Vec<Finding> {
        child_dirs(&ctx.root.join(&self.environments_dir))
            .into_iter()
            .filter(|name| !self.allowed.contains(name))
            .map(|name| {
                self.info
                    .finding(format!("Unexpected environment overlay: {}", name))
                    .at(format!("{}/{}", self.environments_dir, name), None, None)
            })
            .collect()
    }
}
