//! Common helper functions shared across CLI commands
//!
//! This module provides shared functionality for resolving the repository,
//! loading configuration and assembling the execution engine.

use crate::cli::args::ColorChoice;
use crate::config::Config;
use crate::document::Loader;
use crate::engine::{ExecutionEngine, GitLsFiles, SkipPolicy, resolve};
use crate::error::{ConfigError, GuardError};
use crate::rules::RuleRegistry;
use crate::types::RuleFamily;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FINDINGS: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Resolve `--repo` against the current directory
///
/// # Errors
///
/// Returns `GuardError::Usage` when the path is absolute but may not be,
/// escapes the current directory, or is not an existing directory.
pub(crate) fn resolve_repo(repo: &Path, allow_absolute: bool) -> Result<PathBuf, GuardError> {
    let base = std::env::current_dir()?;
    Ok(resolve(repo, &base, allow_absolute)?)
}

/// Load `--config`, else `<repo>/infraguard.toml`, else defaults
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or is invalid.
pub(crate) fn load_config(repo: &Path, explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let config = Config::discover(repo, explicit)?;
    log::debug!("Configuration: {:?}", config.guard);
    Ok(config)
}

/// Build the engine for a run over `families`
///
/// Tracked files come from `git ls-files` when the sensitive-files policy asks
/// for it; every other run walks the tree.
///
/// # Errors
///
/// Returns `GuardError` when a rule table or glob in the configuration does
/// not compile, or `[rules]` names an unknown rule.
pub(crate) fn build_engine(
    config: &Config,
    families: &[RuleFamily],
    strict: bool,
) -> Result<ExecutionEngine, GuardError> {
    let registry = RuleRegistry::from_config(config, families)?;
    let loader = Loader::new(config)?;
    let skip = SkipPolicy::from_config(config, false)?;
    let engine = ExecutionEngine::new(registry, loader, skip, strict);

    let sensitive = &config.policy.sensitive_files;
    if sensitive.use_git && families.contains(&RuleFamily::SensitiveFiles) {
        let timeout = Duration::from_secs(sensitive.git_timeout_secs);
        return Ok(engine.with_lister(Box::new(GitLsFiles::new(timeout))));
    }
    Ok(engine)
}

/// termcolor choice for stdout
pub(crate) fn color_choice(choice: ColorChoice) -> termcolor::ColorChoice {
    match choice {
        ColorChoice::Always => termcolor::ColorChoice::Always,
        ColorChoice::Never => termcolor::ColorChoice::Never,
        ColorChoice::Auto if std::io::stdout().is_terminal() => termcolor::ColorChoice::Auto,
        ColorChoice::Auto => termcolor::ColorChoice::Never,
    }
}
