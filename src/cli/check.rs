//! Guard command implementation
//!
//! Every scanning subcommand (`check`, `supply-chain`, `gitops`,
//! `idempotency`, `terraform`, `sensitive-files`) runs through `run_guard`,
//! which:
//! - Resolves `--repo` inside the current directory
//! - Loads infraguard.toml (or `--config`)
//! - Builds the registry for the subcommand's rule families
//! - Discovers, loads and evaluates documents in parallel
//! - Formats output (human or JSON)
//! - Returns the aggregator's exit code

use crate::cli::args::{ColorChoice, RunArgs};
use crate::cli::common::{EXIT_USAGE, build_engine, color_choice, load_config, resolve_repo};
use crate::engine::{RunResult, Target};
use crate::error::{GuardError, UsageError};
use crate::output::{HumanFormatter, JsonFormatter};
use crate::types::{DocumentKind, RuleFamily};
use std::io::Write;
use std::path::{Path, PathBuf};
use termcolor::StandardStream;

/// Which slice of the rule catalogue a subcommand runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    All,
    SupplyChain,
    Gitops,
    Idempotency,
    Terraform,
    SensitiveFiles,
}

impl Guard {
    pub fn families(self) -> Vec<RuleFamily> {
        match self {
            Guard::All => RuleFamily::all().to_vec(),
            Guard::SupplyChain => RuleFamily::supply_chain(),
            Guard::Gitops => vec![RuleFamily::Gitops],
            Guard::Idempotency => vec![RuleFamily::Pipeline],
            Guard::Terraform => vec![RuleFamily::Terraform],
            Guard::SensitiveFiles => vec![RuleFamily::SensitiveFiles],
        }
    }

    /// The GitOps guard only accepts repository paths relative to the working directory
    pub fn allows_absolute_repo(self) -> bool {
        self != Guard::Gitops
    }
}

/// Run a guard subcommand
///
/// # Arguments
///
/// * `guard` - Which rule families to run
/// * `run` - Shared `--repo/--json/--strict/--summary` flags
/// * `playbooks` - Explicit playbooks (`idempotency` only; empty means discover)
/// * `config` - Explicit configuration file
/// * `color` - Color choice for human output
///
/// # Returns
///
/// Exit code:
/// - 0: No failing findings
/// - 1: Error findings, or any finding with `--strict`
/// - 2: Usage, path or configuration error
pub fn run_guard(
    guard: Guard,
    run: &RunArgs,
    playbooks: &[PathBuf],
    config: Option<&Path>,
    color: ColorChoice,
) -> i32 {
    match run_guard_inner(guard, run, playbooks, config, color) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_USAGE
        }
    }
}

fn run_guard_inner(
    guard: Guard,
    run: &RunArgs,
    playbooks: &[PathBuf],
    config: Option<&Path>,
    color: ColorChoice,
) -> Result<i32, GuardError> {
    let repo = resolve_repo(&run.repo, guard.allows_absolute_repo())?;
    if guard == Guard::Terraform && !repo.join("terraform").is_dir() {
        return Err(UsageError::MissingDirectory {
            what: "terraform/".to_string(),
            path: repo,
        }
        .into());
    }

    let config = load_config(&repo, config)?;
    let engine = build_engine(&config, &guard.families(), run.strict)?;

    let result = if guard == Guard::Idempotency && !playbooks.is_empty() {
        let targets = playbook_targets(&repo, playbooks);
        engine.execute(&repo, &targets)
    } else {
        engine.run(&repo)?
    };

    log::info!(
        "{} findings across {} documents, exit code {}",
        result.findings.len(),
        result.documents.len(),
        result.exit_code
    );
    print_result(&result, run, color)?;
    Ok(result.exit_code)
}

/// Explicit playbooks as forced Pipeline targets
///
/// Paths are taken relative to the repository. Missing files and paths that
/// leave the repository are logged and skipped.
pub fn playbook_targets(repo: &Path, playbooks: &[PathBuf]) -> Vec<Target> {
    let mut targets = Vec::new();
    for playbook in playbooks {
        let path = repo.join(playbook);
        let Ok(resolved) = path.canonicalize() else {
            log::warn!("Playbook not found: {}", playbook.display());
            continue;
        };
        if !resolved.starts_with(repo) {
            log::warn!("Playbook outside repository: {}", playbook.display());
            continue;
        }
        if !resolved.is_file() {
            log::warn!("Playbook is not a file: {}", playbook.display());
            continue;
        }
        targets.push(Target::forced(resolved, DocumentKind::Pipeline));
    }
    targets.sort_by(|a, b| a.path.cmp(&b.path));
    targets.dedup();
    targets
}

fn print_result(result: &RunResult, run: &RunArgs, color: ColorChoice) -> Result<(), GuardError> {
    if run.json {
        let output = JsonFormatter::new().format(result)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    let mut stdout = StandardStream::stdout(color_choice(color));
    HumanFormatter::new()
        .summary_only(run.summary)
        .write(result, &mut stdout)?;
    Ok(())
}
