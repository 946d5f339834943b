//! Terraform lab layout rules
//!
//! Providers and backends are declared once, in the lab environment; modules
//! are consumed from the in-repo module tree.

use crate::config::TerraformPolicy;
use crate::rules::rule::{Finding, RepoContext, RepoRule, Rule, RuleContext, RuleInfo};
use crate::types::{DocumentKind, RuleFamily, Severity};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;

const KINDS: &[DocumentKind] = &[DocumentKind::Terraform];

static PROVIDER_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*provider\s+""#).expect("provider regex is valid"));
static BACKEND_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*backend\s+""#).expect("backend regex is valid"));
static MODULE_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*source\s*=\s*"([^"]+)""#).expect("module source regex is valid")
});

pub fn rules(policy: &TerraformPolicy) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ProviderPlacementRule::new(policy)),
        Box::new(ModuleSourceRule::new(policy)),
    ]
}

pub fn repo_rules(policy: &TerraformPolicy) -> Vec<Box<dyn RepoRule>> {
    vec![
        Box::new(TerraformEnvRule::new(policy)),
        Box::new(RequiredFileRule::new(policy)),
    ]
}

fn env_name(policy: &TerraformPolicy) -> String {
    policy
        .allowed_envs
        .first()
        .cloned()
        .unwrap_or_else(|| "lab".to_string())
}

fn in_dir(rel_path: &str, dir: &str) -> bool {
    rel_path
        .strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

pub struct ProviderPlacementRule {
    info: RuleInfo,
    lab_dir: String,
    env: String,
}

impl ProviderPlacementRule {
    pub fn new(policy: &TerraformPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "terraform-provider-placement",
                RuleFamily::Terraform,
                Severity::Error,
                "provider and backend blocks belong to the lab environment only",
            ),
            lab_dir: policy.lab_dir(),
            env: env_name(policy),
        }
    }
}

impl Rule for ProviderPlacementRule {
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
        if in_dir(&ctx.document.rel_path, &self.lab_dir) {
            return Vec::new();
        }
        let mut findings = Vec::new();
        for (n, line) in lines.iter() {
            let block = if PROVIDER_BLOCK.is_match(line) {
                "provider"
            } else if BACKEND_BLOCK.is_match(line) {
                "backend"
            } else {
                continue;
            };
            findings.push(ctx.locate(
                self.info
                    .finding(format!("{} block outside envs/{}", block, self.env)),
                Some(n),
            ));
        }
        findings
    }
}

pub struct ModuleSourceRule {
    info: RuleInfo,
    lab_dir: String,
    prefixes: Vec<String>,
    exempt: Vec<String>,
    modules_dir: String,
}

impl ModuleSourceRule {
    pub fn new(policy: &TerraformPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "terraform-module-source",
                RuleFamily::Terraform,
                Severity::Warning,
                "The lab environment consumes modules from the in-repo module tree",
            ),
            lab_dir: policy.lab_dir(),
            prefixes: policy.module_prefixes.clone(),
            exempt: policy.module_check_exempt.clone(),
            modules_dir: format!("{}/modules", policy.root),
        }
    }
}

impl Rule for ModuleSourceRule {
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
        let rel_path = &ctx.document.rel_path;
        if !in_dir(rel_path, &self.lab_dir) {
            return Vec::new();
        }
        let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        if self.exempt.iter().any(|e| e == name) {
            return Vec::new();
        }

        lines
            .iter()
            .filter_map(|(n, line)| {
                let source = MODULE_SOURCE.captures(line)?.get(1)?.as_str();
                if self.prefixes.iter().any(|p| source.starts_with(p.as_str())) {
                    return None;
                }
                Some(ctx.locate(
                    self.info.finding(format!(
                        "Module source not under {}: {}",
                        self.modules_dir, source
                    )),
                    Some(n),
                ))
            })
            .collect()
    }
}

pub struct TerraformEnvRule {
    info: RuleInfo,
    root: String,
    allowed: Vec<String>,
}

impl TerraformEnvRule {
    pub fn new(policy: &TerraformPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "terraform-env",
                RuleFamily::Terraform,
                Severity::Error,
                "Only the allowed Terraform environments may exist",
            ),
            root: policy.root.clone(),
            allowed: policy.allowed_envs.clone(),
        }
    }
}

impl RepoRule for TerraformEnvRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &RepoContext<'_>) -> Vec<Finding> {
        if !ctx.root.join(&self.root).is_dir() {
            return Vec::new();
        }
        let envs_rel = format!("{}/envs", self.root);
        let Ok(entries) = fs::read_dir(ctx.root.join(&envs_rel)) else {
            return vec![self
                .info
                .finding(format!("{} directory missing", envs_rel))
                .at(envs_rel, None, None)];
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|ft| ft.is_dir()))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !self.allowed.contains(name))
            .collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                self.info
                    .finding(format!("Unexpected terraform env: {}", name))
                    .at(format!("{}/{}", envs_rel, name), None, None)
            })
            .collect()
    }
}

pub struct RequiredFileRule {
    info: RuleInfo,
    root: String,
    lab_dir: String,
    required: Vec<String>,
}

impl RequiredFileRule {
    pub fn new(policy: &TerraformPolicy) -> Self {
        Self {
            info: RuleInfo::new(
                "terraform-required-file",
                RuleFamily::Terraform,
                Severity::Error,
                "The lab environment carries its provider, version and variable files",
            ),
            root: policy.root.clone(),
            lab_dir: policy.lab_dir(),
            required: policy.required_files.clone(),
        }
    }
}

impl RepoRule for RequiredFileRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &RepoContext<'_>) -> Vec<Finding> {
        if !ctx.root.join(&self.root).is_dir() {
            return Vec::new();
        }
        let lab = ctx.root.join(&self.lab_dir);
        self.required
            .iter()
            .filter(|file| !lab.join(file.as_str()).exists())
            .map(|file| {
                self.info
                    .finding(format!("Missing {} in {}", file, self.lab_dir))
                    .at(format!("{}/{}", self.lab_dir, file), None, None)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::document::{Document, Loader, PathClass};
    use crate::engine::external::NoLister;
    use crate::engine::file_walker::SkipPolicy;
    use crate::rules::rule::View;
    use crate::types::StructuralPath;
    use tempfile::TempDir;

    fn load(rel_path: &str, text: &str) -> Document {
        Loader::new(&Config::default())
            .unwrap()
            .load_text(rel_path, text, PathClass::Known(DocumentKind::Terraform))
    }

    fn run(rule: &dyn Rule, doc: &Document) -> Vec<Finding> {
        let ctx = RuleContext {
            document: doc,
            view: View::Lines(&doc.lines),
            path: StructuralPath::root(),
            strict: false,
        };
        rule.evaluate(&ctx)
    }

    fn repo_run(rule: &dyn RepoRule, root: &std::path::Path) -> Vec<Finding> {
        let skip = SkipPolicy::from_config(&Config::default(), false).unwrap();
        let ctx = RepoContext {
            root,
            strict: false,
            lister: &NoLister,
            skip: &skip,
        };
        rule.evaluate(&ctx)
    }

    #[test]
    fn test_provider_outside_lab() {
        let policy = TerraformPolicy::default();
        let rule = ProviderPlacementRule::new(&policy);
        let text = "terraform {\n  backend \"s3\" {}\n}\n\nprovider \"aws\" {\n  region = \"eu-west-1\"\n}\n";

        let findings = run(&rule, &load("terraform/modules/vpc/main.tf", text));
        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["backend block outside envs/lab", "provider block outside envs/lab"]
        );
        assert_eq!(findings[1].line(), Some(5));

        assert!(run(&rule, &load("terraform/envs/lab/providers.tf", text)).is_empty());
        assert_eq!(run(&rule, &load("terraform/envs/laboratory/main.tf", text)).len(), 2);
    }

    #[test]
    fn test_module_sources_in_lab() {
        let policy = TerraformPolicy::default();
        let rule = ModuleSourceRule::new(&policy);
        let text = "module \"vpc\" {\n  source = \"../../modules/vpc\"\n}\nmodule \"dns\" {\n  source = \"git::https://example.com/dns.git\"\n}\n";

        let findings = run(&rule, &load("terraform/envs/lab/main.tf", text));
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Module source not under terraform/modules: git::https://example.com/dns.git"
        );
        assert_eq!(findings[0].severity, Severity::Warning);

        assert!(run(&rule, &load("terraform/envs/lab/versions.tf", text)).is_empty());
        assert!(run(&rule, &load("terraform/modules/x/main.tf", text)).is_empty());
    }

    #[test]
    fn test_env_layout() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let policy = TerraformPolicy::default();

        // No terraform tree at all: nothing to check
        assert!(repo_run(&TerraformEnvRule::new(&policy), root).is_empty());

        fs::create_dir_all(root.join("terraform")).unwrap();
        let missing = repo_run(&TerraformEnvRule::new(&policy), root);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].message, "terraform/envs directory missing");

        fs::create_dir_all(root.join("terraform/envs/lab")).unwrap();
        fs::create_dir_all(root.join("terraform/envs/prod")).unwrap();
        let extra = repo_run(&TerraformEnvRule::new(&policy), root);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].message, "Unexpected terraform env: prod");
    }

    #[test]
    fn test_required_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let lab = root.join("terraform/envs/lab");
        fs::create_dir_all(&lab).unwrap();
        fs::write(lab.join("providers.tf"), "").unwrap();
        fs::write(lab.join("versions.tf"), "").unwrap();

        let findings = repo_run(&RequiredFileRule::new(&TerraformPolicy::default()), root);
        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Missing defaults.auto.tfvars in terraform/envs/lab",
                "Missing secrets.auto.tfvars in terraform/envs/lab",
            ]
        );
    }
}
