//! Output formatters (human and JSON)

pub mod human;
pub mod json;
pub mod rule_list;

pub use human::HumanFormatter;
pub use json::JsonFormatter;
pub use rule_list::{RuleListHumanFormatter, RuleListJsonFormatter, RuleListing};
