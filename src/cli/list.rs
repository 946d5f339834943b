//! List command implementation
//!
//! Prints the rule catalogue (id, family, severity, description) with each
//! rule's enabled state under the active configuration.

use crate::cli::common::{EXIT_SUCCESS, EXIT_USAGE, load_config};
use crate::error::GuardError;
use crate::output::{RuleListHumanFormatter, RuleListJsonFormatter, RuleListing};
use crate::rules::RuleRegistry;
use std::path::Path;

/// Run the list command
///
/// Configuration is looked up like for the guard commands, with the current
/// directory as the repository.
///
/// # Returns
///
/// Exit code:
/// - 0: Success
/// - 2: Configuration error
pub fn run_list(json: bool, config: Option<&Path>) -> i32 {
    match run_list_inner(json, config) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_USAGE
        }
    }
}

fn run_list_inner(json: bool, config: Option<&Path>) -> Result<(), GuardError> {
    let cwd = std::env::current_dir()?;
    let config = load_config(&cwd, config)?;
    let listings: Vec<RuleListing> = RuleRegistry::catalogue(&config)?
        .iter()
        .map(|info| RuleListing::new(info, &config))
        .collect();

    if json {
        print!("{}", RuleListJsonFormatter::new().format(&listings)?);
    } else {
        print!("{}", RuleListHumanFormatter::new().format(&listings));
    }
    Ok(())
}
