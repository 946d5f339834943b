//! Rule tables injected into the rule families
//!
//! Every constant a rule consults lives here so a run can override it from
//! `infraguard.toml` and tests can build rules against a custom table.

use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// All rule tables, one section per family that has any
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub pipeline: PipelinePolicy,
    pub gitops: GitopsPolicy,
    pub supply_chain: SupplyChainPolicy,
    pub terraform: TerraformPolicy,
    pub sensitive_files: SensitiveFilesPolicy,
}

/// Tables for playbook / task-list rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelinePolicy {
    /// Modules that run raw commands and need a change predicate
    pub command_modules: Vec<String>,
    /// Modules that always handle credentials
    pub secret_modules: Vec<String>,
    /// Lower-case keywords that suggest a task touches secrets
    pub secret_keywords: Vec<String>,
    /// Bare module names that should be fully qualified
    pub short_module_names: Vec<String>,
    /// Task-name words implying a read-only check
    pub check_words: Vec<String>,
    /// Keys that delegate to another task file or role
    pub include_keys: Vec<String>,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            command_modules: strings(&[
                "command",
                "shell",
                "ansible.builtin.command",
                "ansible.builtin.shell",
            ]),
            secret_modules: strings(&[
                "user",
                "ansible.builtin.user",
                "mysql_user",
                "community.mysql.mysql_user",
                "postgresql_user",
                "community.postgresql.postgresql_user",
            ]),
            secret_keywords: strings(&[
                "password",
                "token",
                "secret",
                "key",
                "credential",
                "api_key",
            ]),
            short_module_names: strings(&["command", "shell", "copy", "template", "service", "file"]),
            check_words: strings(&["check", "verify", "test", "get", "find"]),
            include_keys: strings(&[
                "include_tasks",
                "import_tasks",
                "include_role",
                "import_role",
                "ansible.builtin.include_tasks",
                "ansible.builtin.import_tasks",
                "ansible.builtin.include_role",
                "ansible.builtin.import_role",
            ]),
        }
    }
}

/// Tables for manifest and repository-layout rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitopsPolicy {
    /// Directory segment sequences an Application manifest may live under
    pub application_dirs: Vec<String>,
    pub ownership_label: String,
    pub ownership_value: String,
    pub skip_reconcile_annotation: String,
    pub apps_dir: String,
    pub allowed_apps_children: Vec<String>,
    pub environments_dir: String,
    pub allowed_environments: Vec<String>,
    /// Ignore manifests under `cluster/bootstrap`
    pub skip_bootstrap: bool,
}

impl Default for GitopsPolicy {
    fn default() -> Self {
        Self {
            application_dirs: strings(&[
                "apps/argocd/applications",
                "apps/argocd/disabled",
                "argocd/apps",
                "argocd/disabled",
            ]),
            ownership_label: "app.kubernetes.io/part-of".to_string(),
            ownership_value: "apps-root".to_string(),
            skip_reconcile_annotation: "argocd.argoproj.io/skip-reconcile".to_string(),
            apps_dir: "apps".to_string(),
            allowed_apps_children: strings(&["cluster", "user", "argocd"]),
            environments_dir: "cluster/environments".to_string(),
            allowed_environments: strings(&["lab"]),
            skip_bootstrap: true,
        }
    }
}

/// Tables for workflow, build-file, values and documentation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyChainPolicy {
    pub workflow_dirs: Vec<String>,
    pub values_files: Vec<String>,
    pub dockerfile_names: Vec<String>,
    /// Repo-relative changelog documenting tag exceptions
    pub history_file: String,
}

impl Default for SupplyChainPolicy {
    fn default() -> Self {
        Self {
            workflow_dirs: strings(&[".github/workflows", ".gitea/workflows"]),
            values_files: strings(&["values.yaml", "values.yml"]),
            dockerfile_names: strings(&["Dockerfile", "Containerfile", "*.Dockerfile"]),
            history_file: "docs/history.md".to_string(),
        }
    }
}

/// Tables for the Terraform lab layout rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformPolicy {
    pub root: String,
    pub allowed_envs: Vec<String>,
    pub required_files: Vec<String>,
    pub module_prefixes: Vec<String>,
    /// Files in the lab env exempt from the module source check
    pub module_check_exempt: Vec<String>,
}

impl TerraformPolicy {
    /// The env directory that owns providers and backends (`terraform/envs/<first allowed>`)
    pub fn lab_dir(&self) -> String {
        let env = self.allowed_envs.first().map(String::as_str).unwrap_or("lab");
        format!("{}/envs/{}", self.root, env)
    }
}

impl Default for TerraformPolicy {
    fn default() -> Self {
        Self {
            root: "terraform".to_string(),
            allowed_envs: strings(&["lab"]),
            required_files: strings(&[
                "providers.tf",
                "versions.tf",
                "defaults.auto.tfvars",
                "secrets.auto.tfvars",
            ]),
            module_prefixes: strings(&["./modules/", "../modules/", "../../modules/"]),
            module_check_exempt: strings(&["versions.tf", "providers.tf"]),
        }
    }
}

/// Path regexes for files that must never be committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitiveFilesPolicy {
    pub patterns: Vec<String>,
    pub ignore: Vec<String>,
    /// List candidates with `git ls-files` before walking the tree
    pub use_git: bool,
    pub git_timeout_secs: u64,
}

impl Default for SensitiveFilesPolicy {
    fn default() -> Self {
        Self {
            patterns: strings(&[
                r"(^|/)(config\.yaml)$",
                r"(^|/)(ansible|terraform)/op\.env$",
                r"(^|/)\.env([._-].*)?$",
                r"(^|/)(kubeconfig)(\..*)?$",
                r"(^|/).*id_(rsa|ed25519)(\..*)?$",
                r"(^|/).*\.p12$",
                r"(^|/).*\.pfx$",
                r"(^|/).*\.key$",
                r"(^|/).*privkey.*\.pem$",
                r"(^|/).*private.*\.pem$",
                r"(^|/).*terraform\.tfstate(\..*)?$",
                r"(^|/).*\.tfstate\..*$",
                r"(^|/).*secrets\.auto\.tfvars$",
                r"(^|/).*\.tfvars$",
                r"(^|/).*-(unsealed)\.ya?ml$",
                r"(^|/).*unsealed.*\.ya?ml$",
            ]),
            ignore: strings(&[
                r"(^|/)apps/cluster/secrets-cluster/",
                r"(^|/)apps/cluster/sealed-secrets/",
                r"\.sealedsecret\.ya?ml$",
                r"(^|/)docs/archive/",
                r"(^|/)apps/.*/charts/",
                r"(^|/)apps/.*/Chart\.lock$",
                r"(^|/)ansible/roles/.*/tasks/config\.yaml$",
                r"(^|/)ansible/roles/.*/handlers/config\.yaml$",
                r"defaults\.auto\.tfvars$",
            ]),
            use_git: true,
            git_timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let policy: PipelinePolicy = toml::from_str(r#"check_words = ["inspect"]"#).unwrap();
        assert_eq!(policy.check_words, vec!["inspect".to_string()]);
        assert_eq!(policy.command_modules.len(), 4);
        assert!(policy.secret_keywords.contains(&"password".to_string()));
    }

    #[test]
    fn test_terraform_lab_dir() {
        let policy = TerraformPolicy::default();
        assert_eq!(policy.lab_dir(), "terraform/envs/lab");
    }

    #[test]
    fn test_default_sensitive_patterns_compile() {
        let policy = SensitiveFilesPolicy::default();
        for pattern in policy.patterns.iter().chain(policy.ignore.iter()) {
            assert!(regex::Regex::new(pattern).is_ok(), "bad pattern {pattern}");
        }
    }
}
