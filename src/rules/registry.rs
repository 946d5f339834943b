#![forbid(unsafe_code)]

//! Rule registry
//!
//! The RuleRegistry is responsible for:
//! - Building every built-in rule from the policy tables
//! - Filtering rules by the requested families and the `[rules]` toggles
//! - Rejecting configuration that names rules which do not exist
//! - Mapping each document kind to its evaluator and applicable rules
//! - Applying severity overrides to produced findings

use crate::config::Config;
use crate::error::ConfigError;
use crate::rules::evaluator::{Evaluator, evaluator_for};
use crate::rules::load::LoadErrorRule;
use crate::rules::rule::{Finding, RepoRule, Rule, RuleInfo};
use crate::rules::{chart_values, dockerfile, documentation, gitops, pipeline, sensitive_files, terraform, workflow};
use crate::types::{DocumentKind, RuleFamily, RuleId, Severity};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Every built-in rule, in catalogue order
struct Catalogue {
    rules: Vec<Box<dyn Rule>>,
    repo_rules: Vec<Box<dyn RepoRule>>,
}

impl Catalogue {
    fn build(config: &Config) -> Result<Self, ConfigError> {
        let policy = &config.policy;

        let mut rules: Vec<Box<dyn Rule>> = Vec::new();
        rules.extend(pipeline::rules(&policy.pipeline));
        rules.extend(gitops::rules(&policy.gitops));
        rules.extend(workflow::rules());
        rules.extend(dockerfile::rules());
        rules.extend(chart_values::rules());
        rules.extend(terraform::rules(&policy.terraform));

        let mut repo_rules: Vec<Box<dyn RepoRule>> = Vec::new();
        repo_rules.extend(gitops::repo_rules(&policy.gitops));
        repo_rules.extend(documentation::repo_rules(&policy.supply_chain));
        repo_rules.extend(terraform::repo_rules(&policy.terraform));
        repo_rules.extend(sensitive_files::repo_rules(&policy.sensitive_files)?);

        Ok(Self { rules, repo_rules })
    }
}

/// Registry holding the active rules of one run
pub struct RuleRegistry {
    by_kind: BTreeMap<DocumentKind, Vec<Arc<dyn Rule>>>,
    repo_rules: Vec<Box<dyn RepoRule>>,
    load_rule: Option<Arc<dyn Rule>>,
    evaluators: BTreeMap<DocumentKind, Box<dyn Evaluator>>,
    overrides: BTreeMap<RuleId, Severity>,
    infos: Vec<RuleInfo>,
}

impl RuleRegistry {
    /// Create a new empty RuleRegistry
    pub fn new() -> Self {
        Self {
            by_kind: BTreeMap::new(),
            repo_rules: Vec::new(),
            load_rule: None,
            evaluators: BTreeMap::new(),
            overrides: BTreeMap::new(),
            infos: Vec::new(),
        }
    }

    /// Descriptions of every built-in rule, for listing
    pub fn catalogue(config: &Config) -> Result<Vec<RuleInfo>, ConfigError> {
        let catalogue = Catalogue::build(config)?;
        let mut infos = vec![LoadErrorRule::new().info().clone()];
        infos.extend(catalogue.rules.iter().map(|r| r.info().clone()));
        infos.extend(catalogue.repo_rules.iter().map(|r| r.info().clone()));
        Ok(infos)
    }

    /// Build the registry for a run over `families`
    ///
    /// A family is active when it is requested and not disabled in the
    /// configuration; a rule additionally needs to not be switched off in
    /// `[rules]`. The load rule belongs to no family and is always present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` when `[rules]` names an unknown rule
    /// or a table holds an invalid pattern.
    pub fn from_config(config: &Config, families: &[RuleFamily]) -> Result<Self, ConfigError> {
        let catalogue = Catalogue::build(config)?;
        let load_rule = LoadErrorRule::new();

        let known: BTreeSet<&RuleId> = catalogue
            .rules
            .iter()
            .map(|r| r.id())
            .chain(catalogue.repo_rules.iter().map(|r| r.id()))
            .chain(std::iter::once(load_rule.id()))
            .collect();
        if let Some(unknown) = config.rules.keys().find(|id| !known.contains(id)) {
            return Err(ConfigError::Validation(format!(
                "Unknown rule '{}' in [rules]",
                unknown
            )));
        }

        let active = |info: &RuleInfo| match info.family {
            Some(family) => {
                families.contains(&family)
                    && config.family_enabled(family)
                    && config.rule_enabled(&info.id)
            }
            None => true,
        };

        let mut registry = Self::new();
        for rule in catalogue.rules {
            if active(rule.info()) {
                registry.add_rule(rule);
            }
        }
        for rule in catalogue.repo_rules {
            if active(rule.info()) {
                registry.add_repo_rule(rule);
            }
        }
        registry.load_rule = Some(Arc::new(load_rule));

        for kind in DocumentKind::all() {
            registry
                .evaluators
                .insert(kind, evaluator_for(kind, config.policy.gitops.skip_bootstrap));
        }

        for (id, _) in config.rules.iter() {
            if let Some(severity) = config.severity_override(id) {
                registry.overrides.insert(id.clone(), severity);
            }
        }

        log::info!(
            "Registered {} rules ({} repository rules) for {}",
            registry.len(),
            registry.repo_rules.len(),
            families
                .iter()
                .map(RuleFamily::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(registry)
    }

    /// Add a document rule under every kind it applies to
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        let rule: Arc<dyn Rule> = Arc::from(rule);
        self.infos.push(rule.info().clone());
        for kind in rule.kinds() {
            self.by_kind.entry(*kind).or_default().push(Arc::clone(&rule));
        }
    }

    pub fn add_repo_rule(&mut self, rule: Box<dyn RepoRule>) {
        self.infos.push(rule.info().clone());
        self.repo_rules.push(rule);
    }

    /// Document rules for a kind, in registration order
    pub fn rules_for(&self, kind: DocumentKind) -> &[Arc<dyn Rule>] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether any document rule applies to `kind`
    pub fn is_active(&self, kind: DocumentKind) -> bool {
        !self.rules_for(kind).is_empty()
    }

    /// Kinds with at least one active rule
    pub fn active_kinds(&self) -> Vec<DocumentKind> {
        self.by_kind
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn evaluator(&self, kind: DocumentKind) -> Option<&dyn Evaluator> {
        self.evaluators.get(&kind).map(Box::as_ref)
    }

    pub fn repo_rules(&self) -> &[Box<dyn RepoRule>] {
        &self.repo_rules
    }

    pub fn load_rule(&self) -> Option<&dyn Rule> {
        self.load_rule.as_deref()
    }

    /// Replace default severities with configured ones
    pub fn apply_overrides(&self, findings: &mut [Finding]) {
        if self.overrides.is_empty() {
            return;
        }
        for finding in findings {
            if let Some(severity) = self.overrides.get(&finding.rule_id) {
                finding.severity = *severity;
            }
        }
    }

    /// Infos of the registered family rules
    pub fn infos(&self) -> &[RuleInfo] {
        &self.infos
    }

    /// Number of registered family rules (document and repository)
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
