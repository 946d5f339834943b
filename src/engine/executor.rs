#![forbid(unsafe_code)]

//! Parallel execution engine for running rules across documents
//!
//! This module provides the ExecutionEngine which coordinates discovery,
//! loading and evaluation. Files are processed in parallel using rayon; each
//! file is loaded once and every applicable rule sees the same document.

use crate::document::{Document, Loader};
use crate::engine::aggregator::{DocumentInfo, RunResult, aggregate};
use crate::engine::external::{FileLister, NoLister};
use crate::engine::file_walker::{FileWalker, SkipPolicy};
use crate::error::GuardError;
use crate::rules::{Finding, RepoContext, RuleContext, RuleRegistry, View};
use crate::types::{DocumentKind, StructuralPath};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A file to check, optionally with its kind fixed by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub forced: Option<DocumentKind>,
}

impl Target {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            forced: None,
        }
    }

    pub fn forced(path: impl Into<PathBuf>, kind: DocumentKind) -> Self {
        Self {
            path: path.into(),
            forced: Some(kind),
        }
    }
}

/// Execution engine that coordinates parallel rule execution
///
/// The engine:
/// - Enumerates candidate files under the repository root
/// - Loads each file once, in parallel
/// - Runs the evaluator for the document kind and every applicable rule
/// - Runs repository-level rules once
/// - Hands everything to the aggregator for ordering and the exit code
pub struct ExecutionEngine {
    registry: Arc<RuleRegistry>,
    loader: Loader,
    skip: SkipPolicy,
    lister: Box<dyn FileLister>,
    strict: bool,
}

impl ExecutionEngine {
    pub fn new(registry: RuleRegistry, loader: Loader, skip: SkipPolicy, strict: bool) -> Self {
        Self {
            registry: Arc::new(registry),
            loader,
            skip,
            lister: Box::new(NoLister),
            strict,
        }
    }

    /// Use `lister` for repository rules that need the tracked-file list
    pub fn with_lister(mut self, lister: Box<dyn FileLister>) -> Self {
        self.lister = lister;
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Candidate files below `root`, sorted by path
    pub fn discover(&self, root: &Path) -> Result<Vec<Target>, GuardError> {
        let classifier = self.loader.classifier();
        let walker = FileWalker::new(root, &classifier.candidate_patterns(), self.skip.clone())?;
        let targets: Vec<Target> = walker.enumerate()?.into_iter().map(Target::new).collect();
        log::info!("Enumerated {} candidate files under {}", targets.len(), root.display());
        Ok(targets)
    }

    /// Discover, check and aggregate in one go
    pub fn run(&self, root: &Path) -> Result<RunResult, GuardError> {
        let targets = self.discover(root)?;
        Ok(self.execute(root, &targets))
    }

    /// Check `targets` and the repository rooted at `root`
    pub fn execute(&self, root: &Path, targets: &[Target]) -> RunResult {
        let per_file: Vec<(DocumentInfo, Vec<Finding>)> = targets
            .par_iter()
            .filter_map(|target| {
                let document = self.loader.load(root, &target.path, target.forced)?;
                self.execute_document(&document)
            })
            .collect();

        let mut documents = Vec::with_capacity(per_file.len());
        let mut findings = Vec::new();
        for (info, file_findings) in per_file {
            documents.push(info);
            findings.extend(file_findings);
        }
        findings.extend(self.execute_repo_rules(root));
        self.registry.apply_overrides(&mut findings);

        log::info!(
            "Checked {} documents, {} findings",
            documents.len(),
            findings.len()
        );
        aggregate(root, documents, findings, self.strict)
    }

    /// Evaluate one document; `None` when no active rule cares about it
    ///
    /// This method:
    /// 1. Skips documents whose kind has no active rule or that the evaluator excludes
    /// 2. Reports a load error once, then falls back to the line view when allowed
    /// 3. Runs every rule at every evaluation site of a parsed tree
    /// 4. Runs every rule once over the lines otherwise
    pub fn execute_document(&self, document: &Document) -> Option<(DocumentInfo, Vec<Finding>)> {
        if !self.registry.is_active(document.kind) {
            log::debug!("No active rules for {} ({})", document.rel_path, document.kind);
            return None;
        }
        let evaluator = self.registry.evaluator(document.kind)?;
        if !evaluator.applies(document) {
            log::debug!("Evaluator skips {}", document.rel_path);
            return None;
        }

        let info = DocumentInfo {
            path: document.rel_path.clone(),
            kind: document.kind,
            structured: document.is_structured(),
            load_error: document.load_error.as_ref().map(|e| e.message.clone()),
        };
        if document.is_blank() {
            return Some((info, Vec::new()));
        }

        let rules = self.registry.rules_for(document.kind);
        let line_context = || RuleContext {
            document,
            view: View::Lines(&document.lines),
            path: StructuralPath::root(),
            strict: self.strict,
        };

        let mut findings = Vec::new();
        if document.load_error.is_some()
            && let Some(load_rule) = self.registry.load_rule()
        {
            findings.extend(load_rule.evaluate(&line_context()));
        }

        match &document.trees {
            Some(trees) => {
                for (path, node) in evaluator.sites(trees) {
                    let ctx = RuleContext {
                        document,
                        view: View::Node(node),
                        path,
                        strict: self.strict,
                    };
                    for rule in rules {
                        findings.extend(rule.evaluate(&ctx));
                    }
                }
            }
            None if evaluator.supports_fallback() => {
                let ctx = line_context();
                for rule in rules {
                    findings.extend(rule.evaluate(&ctx));
                }
            }
            None => {
                log::debug!("No line rules for {}; structural checks skipped", document.rel_path);
            }
        }
        Some((info, findings))
    }

    fn execute_repo_rules(&self, root: &Path) -> Vec<Finding> {
        let ctx = RepoContext {
            root,
            strict: self.strict,
            lister: self.lister.as_ref(),
            skip: &self.skip,
        };
        self.registry
            .repo_rules()
            .iter()
            .flat_map(|rule| rule.evaluate(&ctx))
            .collect()
    }
}
