//! Reporting documents that could not be loaded

use crate::rules::rule::{Finding, Rule, RuleContext, RuleInfo};
use crate::types::{DocumentKind, Severity};

const KINDS: &[DocumentKind] = &[
    DocumentKind::Pipeline,
    DocumentKind::Manifest,
    DocumentKind::Workflow,
    DocumentKind::Dockerfile,
    DocumentKind::ChartValues,
    DocumentKind::Terraform,
];

/// One Error per document whose load failed, at the parser's line
pub struct LoadErrorRule {
    info: RuleInfo,
}

impl LoadErrorRule {
    pub fn new() -> Self {
        Self {
            info: RuleInfo::core(
                "yaml-parse",
                Severity::Error,
                "Documents must parse; unparseable files are checked line by line",
            ),
        }
    }
}

impl Default for LoadErrorRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for LoadErrorRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(error) = &ctx.document.load_error else {
            return Vec::new();
        };
        vec![self
            .info
            .finding(error.message.clone())
            .at(ctx.document.rel_path.clone(), error.line, None)]
    }
}
