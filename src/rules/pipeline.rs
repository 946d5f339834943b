//! Playbook and role task rules
//!
//! These rules need the parsed tree; on the line view they report nothing.
//! Each rule sees one task mapping at a time, as chosen by the pipeline
//! evaluator.

use crate::config::PipelinePolicy;
use crate::document::{Mapping, Node};
use crate::rules::rule::{Finding, Rule, RuleContext, RuleInfo};
use crate::types::{DocumentKind, RuleFamily, Severity};
use regex::Regex;
use std::sync::LazyLock;

const KINDS: &[DocumentKind] = &[DocumentKind::Pipeline];

static PIPEFAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"set\s+(-[a-zA-Z]+\s+)*-[a-zA-Z]*o\s+pipefail").expect("pipefail regex is valid")
});

/// Characters that only make sense to a shell
const SHELL_FEATURES: &[char] = &['|', '>', '<', '&', ';', '$'];

/// Module arguments that make a command idempotent on their own
const CHANGE_PREDICATE_ARGS: &[&str] = &["creates", "removes"];

/// All pipeline rules built from the policy tables
pub fn rules(policy: &PipelinePolicy) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(TaskNameRule::new(policy)),
        Box::new(ChangedWhenRule::new(policy)),
        Box::new(ShellPipefailRule::new(policy)),
        Box::new(CommandShellFeaturesRule::new(policy)),
        Box::new(NoLogSecretsRule::new(policy)),
        Box::new(ShortModuleNameRule::new(policy)),
    ]
}

/// First key of `task` that names one of `modules`, with its arguments
fn find_module<'a>(task: &'a Mapping, modules: &[String]) -> Option<(&'a str, &'a Node)> {
    task.iter().find(|(key, _)| modules.iter().any(|m| m == key))
}

/// Script text of a command/shell invocation (free-form string or `cmd:`)
fn script_text(args: &Node) -> Option<&str> {
    args.as_str().or_else(|| args.get("cmd").and_then(Node::as_str))
}

fn module_base_name(module: &str) -> &str {
    module.rsplit('.').next().unwrap_or(module)
}

pub struct TaskNameRule {
    info: RuleInfo,
    include_keys: Vec<String>,
}

impl TaskNameRule {
    pub fn new(policy: &PipelinePolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "task-name",
                RuleFamily::Pipeline,
                Severity::Warning,
                "Every task needs a name unless it delegates to another task file or role",
            ),
            include_keys: policy.include_keys.clone(),
        }
    }
}

impl Rule for TaskNameRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(task) = ctx.node().and_then(Node::as_mapping) else {
            return Vec::new();
        };
        if task.contains_key("name") || self.include_keys.iter().any(|k| task.contains_key(k)) {
            return Vec::new();
        }
        vec![ctx.locate(
            self.info
                .finding("Task missing name attribute")
                .with_suggestion("Add name: field to describe what this task does"),
            None,
        )]
    }
}

pub struct ChangedWhenRule {
    info: RuleInfo,
    command_modules: Vec<String>,
    check_words: Vec<String>,
}

impl ChangedWhenRule {
    pub fn new(policy: &PipelinePolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "changed-when",
                RuleFamily::Pipeline,
                Severity::Warning,
                "Command and shell tasks need a change predicate",
            ),
            command_modules: policy.command_modules.clone(),
            check_words: policy.check_words.clone(),
        }
    }

    fn has_change_predicate(task: &Mapping, args: &Node) -> bool {
        if task.contains_key("changed_when") {
            return true;
        }
        let in_mapping = |node: Option<&Node>| {
            node.and_then(Node::as_mapping)
                .is_some_and(|m| CHANGE_PREDICATE_ARGS.iter().any(|k| m.contains_key(k)))
        };
        if in_mapping(Some(args)) || in_mapping(task.get("args")) {
            return true;
        }
        // Free-form `creates=/path` inside the command string
        args.as_str().is_some_and(|s| {
            CHANGE_PREDICATE_ARGS
                .iter()
                .any(|k| s.contains(&format!("{}=", k)))
        })
    }
}

impl Rule for ChangedWhenRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(task) = ctx.node().and_then(Node::as_mapping) else {
            return Vec::new();
        };
        let Some((_, args)) = find_module(task, &self.command_modules) else {
            return Vec::new();
        };
        if Self::has_change_predicate(task, args) {
            return Vec::new();
        }

        if !task.contains_key("register") {
            return vec![ctx.locate(
                self.info
                    .finding("Command/shell task without changed_when or register")
                    .with_suggestion("Add changed_when: and register: for proper idempotency"),
                None,
            )];
        }

        let name = task
            .get("name")
            .and_then(Node::scalar_text)
            .unwrap_or_else(|| "unnamed task".to_string())
            .to_lowercase();
        let looks_read_only = self.check_words.iter().any(|w| name.contains(w.as_str()));

        if looks_read_only {
            if !ctx.strict {
                return Vec::new();
            }
            return vec![ctx.locate(
                self.info
                    .finding("Command/shell task without changed_when")
                    .with_severity(Severity::Info)
                    .with_suggestion("Add changed_when: false if this is a read-only check"),
                None,
            )];
        }

        vec![ctx.locate(
            self.info
                .finding("Command/shell task without changed_when")
                .with_suggestion("Add changed_when: to control when task reports as changed"),
            None,
        )]
    }
}

pub struct ShellPipefailRule {
    info: RuleInfo,
    command_modules: Vec<String>,
}

impl ShellPipefailRule {
    pub fn new(policy: &PipelinePolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "shell-pipefail",
                RuleFamily::Pipeline,
                Severity::Warning,
                "Shell scripts with pipes or redirects must enable pipefail",
            ),
            command_modules: policy.command_modules.clone(),
        }
    }
}

impl Rule for ShellPipefailRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(task) = ctx.node().and_then(Node::as_mapping) else {
            return Vec::new();
        };
        let Some((module, args)) = find_module(task, &self.command_modules) else {
            return Vec::new();
        };
        if module_base_name(module) != "shell" {
            return Vec::new();
        }
        let Some(script) = script_text(args) else {
            return Vec::new();
        };
        if !(script.contains('|') || script.contains('>')) || PIPEFAIL.is_match(script) {
            return Vec::new();
        }
        vec![ctx.locate(
            self.info
                .finding("Shell task with pipes missing \"set -euo pipefail\"")
                .with_suggestion("Add \"set -euo pipefail\" at the start of shell script"),
            None,
        )]
    }
}

pub struct CommandShellFeaturesRule {
    info: RuleInfo,
    command_modules: Vec<String>,
}

impl CommandShellFeaturesRule {
    pub fn new(policy: &PipelinePolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "command-shell-features",
                RuleFamily::Pipeline,
                Severity::Info,
                "The command module does not interpret shell syntax",
            ),
            command_modules: policy.command_modules.clone(),
        }
    }
}

impl Rule for CommandShellFeaturesRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(task) = ctx.node().and_then(Node::as_mapping) else {
            return Vec::new();
        };
        let Some((module, args)) = find_module(task, &self.command_modules) else {
            return Vec::new();
        };
        if module_base_name(module) != "command" {
            return Vec::new();
        }
        let Some(script) = script_text(args) else {
            return Vec::new();
        };
        if !script.contains(SHELL_FEATURES) {
            return Vec::new();
        }
        vec![ctx.locate(
            self.info
                .finding("Command module used with shell features")
                .with_suggestion("Consider using shell module instead (requires pipes, redirects, etc.)"),
            None,
        )]
    }
}

pub struct NoLogSecretsRule {
    info: RuleInfo,
    secret_modules: Vec<String>,
    secret_keywords: Vec<String>,
}

impl NoLogSecretsRule {
    pub fn new(policy: &PipelinePolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "no-log-secrets",
                RuleFamily::Pipeline,
                Severity::Warning,
                "Tasks that touch credentials must set no_log",
            ),
            secret_modules: policy.secret_modules.clone(),
            secret_keywords: policy
                .secret_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    /// `no_log` set to a truthy value, or templated and decided at runtime
    fn opted_out(task: &Mapping) -> bool {
        let Some(value) = task.get("no_log").and_then(Node::as_scalar) else {
            return false;
        };
        value.is_truthy() || value.as_str().is_some_and(|s| s.contains("{{"))
    }
}

impl Rule for NoLogSecretsRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(node) = ctx.node() else {
            return Vec::new();
        };
        let Some(task) = node.as_mapping() else {
            return Vec::new();
        };
        if Self::opted_out(task) {
            return Vec::new();
        }

        let uses_secret_module = find_module(task, &self.secret_modules).is_some();
        let text = node.text().to_lowercase();
        let mentions_secret = self
            .secret_keywords
            .iter()
            .any(|k| text.contains(k.as_str()));

        if !(uses_secret_module || mentions_secret) {
            return Vec::new();
        }
        vec![ctx.locate(
            self.info
                .finding("Task may handle secrets without no_log")
                .with_suggestion("Add no_log: true to prevent secret leakage"),
            None,
        )]
    }
}

pub struct ShortModuleNameRule {
    info: RuleInfo,
    short_names: Vec<String>,
}

impl ShortModuleNameRule {
    pub fn new(policy: &PipelinePolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "short-module-name",
                RuleFamily::Pipeline,
                Severity::Info,
                "Prefer fully qualified module names",
            ),
            short_names: policy.short_module_names.clone(),
        }
    }
}

impl Rule for ShortModuleNameRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let Some(task) = ctx.node().and_then(Node::as_mapping) else {
            return Vec::new();
        };
        task.iter()
            .filter(|(key, _)| self.short_names.iter().any(|s| s == key))
            .map(|(key, value)| {
                ctx.locate(
                    self.info
                        .finding(format!("Short module name used: use ansible.builtin.{}", key)),
                    value.line,
                )
            })
            .collect()
    }
}
