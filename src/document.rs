//! Document model: generic trees, raw lines and loading

pub mod lines;
pub mod loader;
pub mod node;

pub use lines::LineScanner;
pub use loader::{Classifier, Loader, PathClass};
pub use node::{Mapping, Node, NodeKind, Scalar};

use crate::error::LoadError;
use crate::types::DocumentKind;
use std::path::PathBuf;

/// One scanned file
#[derive(Debug, Clone)]
pub struct Document {
    /// Path on disk
    pub path: PathBuf,
    /// Repo-relative path with `/` separators, used in findings
    pub rel_path: String,
    pub kind: DocumentKind,
    /// Parsed YAML documents; `None` for line-oriented kinds, fallback-only runs and load failures
    pub trees: Option<Vec<Node>>,
    /// Raw text, always kept for fallback rules
    pub lines: LineScanner,
    pub load_error: Option<LoadError>,
}

impl Document {
    /// Whether structural rules can run
    pub fn is_structured(&self) -> bool {
        self.trees.is_some()
    }

    /// Whether the file has no content worth checking
    pub fn is_blank(&self) -> bool {
        self.load_error.is_none() && self.lines.is_empty()
    }
}

/// Non-empty `/`-separated segments of a relative path
pub fn segments(rel_path: &str) -> Vec<&str> {
    rel_path.split('/').filter(|s| !s.is_empty() && *s != ".").collect()
}

/// Whether `run` (e.g. `apps/argocd/applications`) occurs as consecutive segments of `rel_path`
pub fn has_segment_run(rel_path: &str, run: &str) -> bool {
    let haystack = segments(rel_path);
    let needle = segments(run);
    if needle.is_empty() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle.as_slice())
}
