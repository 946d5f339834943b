//! CLI argument parsing using clap

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Color when stdout is a terminal
    Auto,
    /// Always use color
    Always,
    /// Never use color
    Never,
}

/// infraguard CLI main entry point
#[derive(Parser, Debug)]
#[command(name = "infraguard")]
#[command(about = "Policy guard for infrastructure-as-code repositories")]
#[command(version)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Output coloring
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// No diagnostics on stderr
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to <repo>/infraguard.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}

/// Flags shared by every guard subcommand
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Repository root to scan, inside the current directory
    #[arg(long)]
    pub repo: PathBuf,

    /// Print findings as JSON
    #[arg(long)]
    pub json: bool,

    /// Fail on warnings and info findings too
    #[arg(long)]
    pub strict: bool,

    /// Print only the summary (human output)
    #[arg(long)]
    pub summary: bool,
}

/// Available infraguard subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every enabled rule family
    Check(RunArgs),

    /// Workflow action pins, base image digests, chart image tags and the history file
    SupplyChain(RunArgs),

    /// GitOps layout, SealedSecrets and ArgoCD Application checks
    Gitops(RunArgs),

    /// Ansible idempotency checks
    Idempotency {
        #[command(flatten)]
        run: RunArgs,

        /// Playbooks to check, relative to the repository (defaults to discovery)
        playbooks: Vec<PathBuf>,
    },

    /// Terraform lab layout checks
    Terraform(RunArgs),

    /// Committed sensitive files
    SensitiveFiles(RunArgs),

    /// List all rules
    List {
        /// Print the rule list as JSON
        #[arg(long)]
        json: bool,
    },
}
