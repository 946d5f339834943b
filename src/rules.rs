#![forbid(unsafe_code)]

//! Rule definitions, per-kind evaluators and the registry

pub mod chart_values;
pub mod dockerfile;
pub mod documentation;
pub mod evaluator;
pub mod gitops;
pub mod load;
pub mod pipeline;
mod registry;
mod rule;
pub mod sensitive_files;
pub mod terraform;
pub mod workflow;

pub use evaluator::{Evaluator, evaluator_for};
pub use registry::RuleRegistry;
pub use rule::{Finding, Location, RepoContext, RepoRule, Rule, RuleContext, RuleInfo, View};
