//! infraguard CLI entry point

use clap::Parser;
use infraguard::cli::{Cli, Command, Guard, run_guard, run_list};
use std::process;

fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    let config = cli.config.as_deref();
    let exit_code = match &cli.command {
        Command::Check(run) => run_guard(Guard::All, run, &[], config, cli.color),
        Command::SupplyChain(run) => run_guard(Guard::SupplyChain, run, &[], config, cli.color),
        Command::Gitops(run) => run_guard(Guard::Gitops, run, &[], config, cli.color),
        Command::Idempotency { run, playbooks } => {
            run_guard(Guard::Idempotency, run, playbooks, config, cli.color)
        }
        Command::Terraform(run) => run_guard(Guard::Terraform, run, &[], config, cli.color),
        Command::SensitiveFiles(run) => {
            run_guard(Guard::SensitiveFiles, run, &[], config, cli.color)
        }
        Command::List { json } => run_list(*json, config),
    };

    process::exit(exit_code);
}
