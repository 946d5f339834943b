//! Turning files into [`Document`]s
//!
//! Structured parsing is attempted first. Whatever happens, a `Document` comes
//! back: parse failures, oversized and unreadable files are recorded in
//! `load_error` and the raw lines stay available for fallback rules.

use crate::config::Config;
use crate::document::lines::LineScanner;
use crate::document::node::{LineLocator, Node};
use crate::document::{Document, has_segment_run, segments};
use crate::error::{LoadError, UsageError};
use crate::types::{DocumentKind, GlobPattern};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static PLAYBOOK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^-\s+(hosts|import_playbook)\s*:").expect("playbook regex is valid")
});

static SEQUENCE_ITEM_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^-\s+\S").expect("sequence regex is valid"));

/// Directory names whose YAML files are bare task lists
const TASK_LIST_DIRS: &[&str] = &["tasks", "handlers"];

/// Chart template directories; their files are Go templates, not YAML
const TEMPLATE_DIRS: &[&str] = &["templates"];

/// What the path alone says about a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Kind fixed by name or location
    Known(DocumentKind),
    /// YAML whose kind depends on its content
    Yaml,
    /// Templated manifest, only ever checked line by line
    Template,
    /// Not a candidate
    Ignored,
}

/// Maps repo-relative paths to document kinds
#[derive(Debug, Clone)]
pub struct Classifier {
    dockerfiles: GlobSet,
    dockerfile_patterns: Vec<String>,
    workflow_dirs: Vec<String>,
    values_files: Vec<String>,
    terraform_root: String,
}

impl Classifier {
    pub fn new(config: &Config) -> Result<Self, UsageError> {
        let supply_chain = &config.policy.supply_chain;
        let mut builder = GlobSetBuilder::new();
        for pattern in &supply_chain.dockerfile_names {
            let glob = Glob::new(pattern).map_err(|e| UsageError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let dockerfiles = builder.build().map_err(|e| UsageError::InvalidPattern {
            pattern: "<dockerfile names>".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            dockerfiles,
            dockerfile_patterns: supply_chain.dockerfile_names.clone(),
            workflow_dirs: supply_chain.workflow_dirs.clone(),
            values_files: supply_chain.values_files.clone(),
            terraform_root: config.policy.terraform.root.clone(),
        })
    }

    /// File-name globs for enumeration
    pub fn candidate_patterns(&self) -> Vec<GlobPattern> {
        let mut patterns: Vec<GlobPattern> = ["*.yml", "*.yaml", "*.tf"]
            .into_iter()
            .map(GlobPattern::from)
            .collect();
        patterns.extend(self.dockerfile_patterns.iter().map(|p| GlobPattern::new(p.clone())));
        patterns
    }

    pub fn by_path(&self, rel_path: &str) -> PathClass {
        let name = segments(rel_path).last().copied().unwrap_or_default();

        if self.dockerfiles.is_match(name) {
            return PathClass::Known(DocumentKind::Dockerfile);
        }

        if name.ends_with(".tf") {
            return if segments(rel_path).first() == Some(&self.terraform_root.as_str()) {
                PathClass::Known(DocumentKind::Terraform)
            } else {
                PathClass::Ignored
            };
        }

        if !(name.ends_with(".yml") || name.ends_with(".yaml")) {
            return PathClass::Ignored;
        }

        if self
            .workflow_dirs
            .iter()
            .any(|dir| has_segment_run(parent_of(rel_path), dir))
        {
            return PathClass::Known(DocumentKind::Workflow);
        }

        if self.values_files.iter().any(|v| v == name) {
            return PathClass::Known(DocumentKind::ChartValues);
        }

        if segments(parent_of(rel_path))
            .iter()
            .any(|dir| TEMPLATE_DIRS.contains(dir))
        {
            return PathClass::Template;
        }

        PathClass::Yaml
    }
}

fn parent_of(rel_path: &str) -> &str {
    rel_path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn in_task_list_dir(rel_path: &str) -> bool {
    segments(parent_of(rel_path))
        .last()
        .is_some_and(|dir| TASK_LIST_DIRS.contains(dir))
}

/// Content-based kind for YAML files not fixed by path
pub fn sniff_tree_kind(rel_path: &str, trees: &[Node]) -> DocumentKind {
    let task_dir = in_task_list_dir(rel_path);
    for tree in trees {
        let Some(items) = tree.as_sequence() else {
            continue;
        };
        if items
            .iter()
            .any(|item| item.get("hosts").is_some() || item.get("import_playbook").is_some())
        {
            return DocumentKind::Pipeline;
        }
        if task_dir && !items.is_empty() && items.iter().all(|item| item.as_mapping().is_some()) {
            return DocumentKind::Pipeline;
        }
    }
    DocumentKind::Manifest
}

/// Kind sniffing for text that was never parsed
pub fn sniff_text_kind(rel_path: &str, text: &str) -> DocumentKind {
    if PLAYBOOK_LINE.is_match(text) || (in_task_list_dir(rel_path) && SEQUENCE_ITEM_LINE.is_match(text)) {
        DocumentKind::Pipeline
    } else {
        DocumentKind::Manifest
    }
}

/// Parse a (possibly multi-document) YAML stream
pub fn parse_yaml(text: &str) -> Result<Vec<Node>, LoadError> {
    let mut locator = LineLocator::new(text);
    let mut trees = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let mut value = serde_yaml::Value::deserialize(document).map_err(|e| {
            let line = e
                .location()
                .and_then(|location| u32::try_from(location.line()).ok());
            LoadError::at_line(format!("Invalid YAML: {}", e), line)
        })?;
        if let Err(e) = value.apply_merge() {
            log::debug!("Leaving merge keys unresolved: {}", e);
        }
        trees.push(Node::from_yaml(&value, &mut locator));
    }
    Ok(trees)
}

/// Builds documents according to the run configuration
#[derive(Debug, Clone)]
pub struct Loader {
    classifier: Classifier,
    max_file_bytes: u64,
    fallback_only: bool,
}

impl Loader {
    pub fn new(config: &Config) -> Result<Self, UsageError> {
        Ok(Self {
            classifier: Classifier::new(config)?,
            max_file_bytes: config.guard.max_file_bytes,
            fallback_only: config.guard.fallback_only,
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Load a file below `root`
    ///
    /// Returns `None` when the path is not a candidate and no kind was forced.
    pub fn load(&self, root: &Path, path: &Path, forced: Option<DocumentKind>) -> Option<Document> {
        let rel_path = relative_display(root, path);
        let class = match forced {
            Some(kind) => PathClass::Known(kind),
            None => self.classifier.by_path(&rel_path),
        };
        if class == PathClass::Ignored {
            return None;
        }

        let text = match read_bounded(path, self.max_file_bytes) {
            Ok(text) => text,
            Err(error) => {
                log::warn!("{}: {}", rel_path, error);
                let kind = match class {
                    PathClass::Known(kind) => kind,
                    PathClass::Template | PathClass::Yaml | PathClass::Ignored => {
                        DocumentKind::Manifest
                    }
                };
                return Some(Document {
                    path: path.to_path_buf(),
                    rel_path,
                    kind,
                    trees: None,
                    lines: LineScanner::default(),
                    load_error: Some(error),
                });
            }
        };

        let mut document = self.load_text(&rel_path, &text, class);
        document.path = path.to_path_buf();
        Some(document)
    }

    /// Build a document from text already in memory
    pub fn load_text(&self, rel_path: &str, text: &str, class: PathClass) -> Document {
        let lines = LineScanner::new(text);
        let mut document = Document {
            path: rel_path.into(),
            rel_path: rel_path.to_string(),
            kind: DocumentKind::Manifest,
            trees: None,
            lines,
            load_error: None,
        };

        let known = match class {
            PathClass::Known(kind) => Some(kind),
            PathClass::Template => Some(DocumentKind::Manifest),
            PathClass::Yaml | PathClass::Ignored => None,
        };
        let is_yaml = class != PathClass::Template && known.is_none_or(|kind| kind.is_yaml());

        if !is_yaml || self.fallback_only || document.lines.is_empty() {
            document.kind = known.unwrap_or_else(|| sniff_text_kind(rel_path, text));
            return document;
        }

        match parse_yaml(text) {
            Ok(trees) => {
                document.kind = known.unwrap_or_else(|| sniff_tree_kind(rel_path, &trees));
                document.trees = Some(trees);
            }
            Err(error) => {
                log::warn!("{}: {}", rel_path, error);
                document.kind = known.unwrap_or_else(|| sniff_text_kind(rel_path, text));
                document.load_error = Some(error);
            }
        }
        log::debug!("Loaded {} as {}", rel_path, document.kind);
        document
    }
}

/// Repo-relative path with `/` separators
pub fn relative_display(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read a file with permissive decoding, refusing anything above `max_bytes`
fn read_bounded(path: &Path, max_bytes: u64) -> Result<String, LoadError> {
    let metadata =
        fs::metadata(path).map_err(|e| LoadError::new(format!("Failed to read file: {}", e)))?;
    if metadata.len() > max_bytes {
        return Err(LoadError::new(format!(
            "File exceeds size limit ({} bytes)",
            max_bytes
        )));
    }
    let bytes = fs::read(path).map_err(|e| LoadError::new(format!("Failed to read file: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
