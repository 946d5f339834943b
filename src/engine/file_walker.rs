//! Repository resolution and file discovery
//!
//! `resolve` turns a user-supplied `--repo` argument into a directory that is
//! guaranteed to sit inside a trusted base. `FileWalker` enumerates candidate
//! files below it with the ignore crate, pruning noise directories before
//! descending into them.

use crate::config::Config;
use crate::document::segments;
use crate::error::{GuardError, UsageError};
use crate::types::GlobPattern;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolve `repo_arg` against `base`
///
/// Relative arguments are joined onto `base`. The result must exist, be a
/// directory and stay inside `base` both lexically and after symlinks are
/// resolved.
pub fn resolve(repo_arg: &Path, base: &Path, allow_absolute: bool) -> Result<PathBuf, UsageError> {
    if repo_arg.is_absolute() && !allow_absolute {
        return Err(UsageError::AbsolutePathNotAllowed(repo_arg.to_path_buf()));
    }

    let base = base.canonicalize().unwrap_or_else(|_| normalize(base));
    let candidate = normalize(&base.join(repo_arg));
    if !candidate.starts_with(&base) {
        return Err(UsageError::OutsideBase {
            base,
            path: candidate,
        });
    }

    if !candidate.exists() {
        return Err(UsageError::NotFound(candidate));
    }
    if !candidate.is_dir() {
        return Err(UsageError::NotADirectory(candidate));
    }

    let resolved = candidate
        .canonicalize()
        .map_err(|_| UsageError::NotFound(candidate.clone()))?;
    if !resolved.starts_with(&base) {
        return Err(UsageError::OutsideBase {
            base,
            path: resolved,
        });
    }

    log::info!("Resolved repository {}", resolved.display());
    Ok(resolved)
}

/// Lexically collapse `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Which paths are never scanned
#[derive(Debug, Clone)]
pub struct SkipPolicy {
    skip_dirs: Vec<String>,
    exclude: Option<GlobSet>,
    skip_bootstrap: bool,
}

impl SkipPolicy {
    pub fn new(
        skip_dirs: Vec<String>,
        exclude: &[GlobPattern],
        skip_bootstrap: bool,
    ) -> Result<Self, UsageError> {
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };
        Ok(Self {
            skip_dirs,
            exclude,
            skip_bootstrap,
        })
    }

    /// Skip policy from the `[guard]` section
    pub fn from_config(config: &Config, skip_bootstrap: bool) -> Result<Self, UsageError> {
        Self::new(
            config.guard.skip_dirs.clone(),
            &config.guard.exclude,
            skip_bootstrap,
        )
    }

    /// Whether a repo-relative path (file or directory) is excluded
    pub fn should_skip(&self, rel_path: &str) -> bool {
        let parts = segments(rel_path);
        if parts.iter().any(|p| self.skip_dirs.iter().any(|s| s == p)) {
            return true;
        }
        if parts.contains(&"docs") && parts.contains(&"archive") {
            return true;
        }
        if self.skip_bootstrap && is_bootstrap(&parts) {
            return true;
        }
        if let Some(exclude) = &self.exclude
            && exclude.is_match(rel_path)
        {
            return true;
        }
        false
    }
}

/// `cluster` immediately followed by `bootstrap`
pub fn is_bootstrap(parts: &[&str]) -> bool {
    parts
        .windows(2)
        .any(|pair| pair[0] == "cluster" && pair[1] == "bootstrap")
}

/// Builds a GlobSet from patterns
pub fn build_globset(patterns: &[GlobPattern]) -> Result<GlobSet, UsageError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern.as_str()).map_err(|e| UsageError::InvalidPattern {
            pattern: pattern.as_str().to_string(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| UsageError::InvalidPattern {
        pattern: "<globset>".to_string(),
        message: e.to_string(),
    })
}

/// Enumerates files under a root whose names match a pattern set
pub struct FileWalker {
    root: PathBuf,
    names: GlobSet,
    skip: SkipPolicy,
}

impl FileWalker {
    /// # Arguments
    /// * `root` - Repository root (already resolved)
    /// * `patterns` - File-name globs such as `*.yaml` or `Dockerfile`
    /// * `skip` - Directories and globs that are pruned
    pub fn new(root: &Path, patterns: &[GlobPattern], skip: SkipPolicy) -> Result<Self, UsageError> {
        Ok(Self {
            root: root.to_path_buf(),
            names: build_globset(patterns)?,
            skip,
        })
    }

    /// All matching files, sorted by path
    ///
    /// Only an unreadable root fails; entries below it that cannot be read are
    /// logged and skipped.
    pub fn enumerate(&self) -> Result<Vec<PathBuf>, GuardError> {
        fs::read_dir(&self.root)?;
        let root = self.root.clone();
        let skip = self.skip.clone();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                let rel = relative(&root, entry.path());
                rel.is_empty() || !skip.should_skip(&rel)
            })
            .build();

        let mut files = Vec::new();
        for result in walker {
            let Some(entry) = readable_entry(result) else {
                continue;
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if self.names.is_match(name.as_ref()) {
                log::debug!("Found {}", entry.path().display());
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// The walked entry, or `None` once its error has been logged
fn readable_entry(result: Result<DirEntry, ignore::Error>) -> Option<DirEntry> {
    match result {
        Ok(entry) => Some(entry),
        Err(e) => {
            log::warn!("Skipping unreadable path: {}", e);
            None
        }
    }
}

fn relative(root: &Path, path: &Path) -> String {
    crate::document::loader::relative_display(root, path)
}
