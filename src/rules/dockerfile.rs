//! Container build file rules

use crate::rules::rule::{Finding, Rule, RuleContext, RuleInfo};
use crate::types::{DocumentKind, RuleFamily, Severity};
use std::collections::HashSet;

const KINDS: &[DocumentKind] = &[DocumentKind::Dockerfile];

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![Box::new(BaseImageDigestRule::new())]
}

/// A parsed `FROM` instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromLine<'a> {
    pub image: &'a str,
    pub alias: Option<&'a str>,
}

/// Parse a `FROM [--flag=…] image [AS name]` line, case-insensitively
pub fn parse_from(line: &str) -> Option<FromLine<'_>> {
    let mut tokens = line.split_whitespace();
    if !tokens.next()?.eq_ignore_ascii_case("FROM") {
        return None;
    }
    let mut tokens = tokens.skip_while(|t| t.starts_with("--"));
    let image = tokens.next()?;
    let alias = match (tokens.next(), tokens.next()) {
        (Some(kw), Some(name)) if kw.eq_ignore_ascii_case("AS") => Some(name),
        _ => None,
    };
    Some(FromLine { image, alias })
}

pub struct BaseImageDigestRule {
    info: RuleInfo,
}

impl BaseImageDigestRule {
    pub fn new() -> Self {
        Self {
            info: RuleInfo::new(
                "base-image-digest",
                RuleFamily::BuildFile,
                Severity::Warning,
                "Base images must be pinned by digest",
            ),
        }
    }
}

impl Default for BaseImageDigestRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for BaseImageDigestRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(lines) = ctx.lines() else {
            return Vec::new();
        };

        let mut stages: HashSet<String> = HashSet::new();
        let mut findings = Vec::new();
        for (n, line) in lines.iter() {
            let Some(from) = parse_from(line) else {
                continue;
            };
            let image = from.image.to_lowercase();
            let exempt = image == "scratch" || stages.contains(&image);
            if let Some(alias) = from.alias {
                stages.insert(alias.to_lowercase());
            }
            if exempt || from.image.contains("@sha256:") {
                continue;
            }
            findings.push(ctx.locate(
                self.info
                    .finding(format!("Base image not pinned by digest: {}", from.image)),
                Some(n),
            ));
        }
        findings
    }
}
