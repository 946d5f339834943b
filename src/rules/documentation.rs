//! Repository documentation rules

use crate::config::SupplyChainPolicy;
use crate::rules::rule::{Finding, RepoContext, RepoRule, RuleInfo};
use crate::types::{RuleFamily, Severity};

pub fn repo_rules(policy: &SupplyChainPolicy) -> Vec<Box<dyn RepoRule>> {
    vec![Box::new(HistoryFileRule::new(policy))]
}

/// The changelog that records tag exceptions must exist
pub struct HistoryFileRule {
    info: RuleInfo,
    history_file: String,
}

impl HistoryFileRule {
    pub fn new(policy: &SupplyChainPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "history-file",
                RuleFamily::Documentation,
                Severity::Warning,
                "The history file documents image tag usage and exceptions",
            ),
            history_file: policy.history_file.clone(),
        }
    }
}

impl RepoRule for HistoryFileRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &RepoContext<'_>) -> Vec<Finding> {
        if ctx.root.join(&self.history_file).is_file() {
            return Vec::new();
        }
        vec![self
            .info
            .finding(format!(
                "{} missing (used to document tag usage/exceptions)",
                self.history_file
            ))
            .at(self.history_file.clone(), None, None)]
    }
}
