//! CI workflow rules

use crate::document::LineScanner;
use crate::rules::rule::{Finding, Rule, RuleContext, RuleInfo};
use crate::types::{DocumentKind, RuleFamily, Severity};
use regex::Regex;
use std::sync::LazyLock;

const KINDS: &[DocumentKind] = &[DocumentKind::Workflow];

static COMMIT_SHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("sha regex is valid"));

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![Box::new(ActionPinRule::new())]
}

/// Whether a `uses:` reference needs a commit pin, and has one
///
/// Local actions (`./…`) and container actions (`docker://…`) are exempt.
pub fn is_pinned(reference: &str) -> bool {
    if reference.starts_with("./") || reference.starts_with("docker://") {
        return true;
    }
    reference
        .rsplit_once('@')
        .is_some_and(|(_, version)| COMMIT_SHA.is_match(version))
}

pub struct ActionPinRule {
    info: RuleInfo,
}

impl ActionPinRule {
    pub fn new() -> Self {
        Self {
            info: RuleInfo::new(
                "action-pin",
                RuleFamily::Workflow,
                Severity::Warning,
                "Third-party actions must be pinned to a full commit SHA",
            ),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>, reference: &str, line: Option<u32>) -> Option<Finding> {
        let reference = reference.trim();
        if reference.is_empty() || is_pinned(reference) {
            return None;
        }
        Some(ctx.locate(
            self.info
                .finding(format!("Action not pinned to SHA: {}", reference)),
            line,
        ))
    }
}

impl Default for ActionPinRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ActionPinRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if let Some(node) = ctx.node() {
            return node
                .get("uses")
                .and_then(|uses| {
                    let reference = uses.as_str()?;
                    self.check(ctx, reference, uses.line)
                })
                .into_iter()
                .collect();
        }

        let Some(lines) = ctx.lines() else {
            return Vec::new();
        };
        lines
            .iter()
            .filter_map(|(n, line)| {
                let (key, value) = LineScanner::key_value(line)?;
                if key != "uses" {
                    return None;
                }
                self.check(ctx, value, Some(n))
            })
            .collect()
    }
}
