//! Bounded-time external commands
//!
//! The only subprocess the guard runs is `git ls-files`, used to list the
//! files a repository actually tracks. It always runs under a timeout and any
//! failure degrades to the built-in file walk.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Poll interval while waiting on a child process
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
}

/// Run `program args…` in `cwd`, killing it once `timeout` elapses
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> Result<Vec<u8>, ExternalError> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExternalError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Drain pipes on threads so a chatty child cannot block on a full buffer
    let stdout_handle = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_handle = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ExternalError::Timeout {
                        program: program.to_string(),
                        timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = child.kill();
                return Err(ExternalError::Wait {
                    program: program.to_string(),
                    source,
                });
            }
        }
    };

    let stdout = stdout_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    if !status.success() {
        return Err(ExternalError::Failed {
            program: program.to_string(),
            code: status.code(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }
    Ok(stdout)
}

/// Source of the repo-relative paths a repository tracks
pub trait FileLister: Send + Sync {
    /// `None` means "unknown": callers fall back to walking the tree
    fn list_files(&self, root: &Path) -> Option<Vec<String>>;
}

/// Lists tracked files with `git ls-files`
#[derive(Debug, Clone)]
pub struct GitLsFiles {
    timeout: Duration,
}

impl GitLsFiles {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl FileLister for GitLsFiles {
    fn list_files(&self, root: &Path) -> Option<Vec<String>> {
        match run_with_timeout("git", &["ls-files", "-z"], root, self.timeout) {
            Ok(stdout) => {
                let text = String::from_utf8_lossy(&stdout);
                let mut files: Vec<String> = text
                    .split('\0')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                files.sort();
                log::debug!("git ls-files listed {} files", files.len());
                Some(files)
            }
            Err(e) => {
                log::warn!("Falling back to directory walk: {}", e);
                None
            }
        }
    }
}

/// Never lists anything, forcing the directory walk
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLister;

impl FileLister for NoLister {
    fn list_files(&self, _root: &Path) -> Option<Vec<String>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_program_is_spawn_error() {
        let temp = TempDir::new().unwrap();
        let result = run_with_timeout(
            "infraguard-no-such-program",
            &[],
            temp.path(),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ExternalError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let temp = TempDir::new().unwrap();
        let start = Instant::now();
        let result = run_with_timeout("sleep", &["5"], temp.path(), Duration::from_millis(100));
        assert!(matches!(result, Err(ExternalError::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout() {
        let temp = TempDir::new().unwrap();
        let out = run_with_timeout("echo", &["hello"], temp.path(), Duration::from_secs(5)).unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[test]
    fn test_git_outside_repository_degrades() {
        let temp = TempDir::new().unwrap();
        // Either git is missing or the directory is not a repository
        let lister = GitLsFiles::new(Duration::from_secs(5));
        assert!(lister.list_files(temp.path()).is_none());
    }

    #[test]
    fn test_no_lister() {
        assert!(NoLister.list_files(Path::new(".")).is_none());
    }
}
