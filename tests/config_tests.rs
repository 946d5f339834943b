//! Integration tests for configuration parsing
//!
//! This module contains integration tests that verify:
//! - Config loading from fixture files
//! - Validation of versions, patterns and rule ids
//! - That policy tables reach the rules that consume them

mod common;

use common::TestRepo;
use infraguard::config::Config;
use infraguard::error::ConfigError;
use infraguard::rules::RuleRegistry;
use infraguard::types::{DocumentKind, RuleFamily, RuleId, Severity};
use std::path::PathBuf;

fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("config")
        .join(filename)
}

fn rule(id: &str) -> RuleId {
    RuleId::new(id).unwrap()
}

#[test]
fn test_config_load_valid_minimal() {
    let config = Config::load(fixture_path("valid_minimal.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_valid_full() {
    let config = Config::load(fixture_path("valid_full.toml")).unwrap();

    assert_eq!(config.guard.skip_dirs, vec![".git", "vendor"]);
    assert_eq!(config.guard.exclude.len(), 2);
    assert_eq!(config.guard.max_file_bytes, 1_048_576);
    assert!(!config.family_enabled(RuleFamily::Terraform));
    assert!(config.family_enabled(RuleFamily::SensitiveFiles));
    assert!(config.family_enabled(RuleFamily::Gitops));

    assert!(!config.rule_enabled(&rule("short-module-name")));
    assert_eq!(config.severity_override(&rule("changed-when")), Some(Severity::Error));
    assert_eq!(config.severity_override(&rule("action-pin")), Some(Severity::Error));
    assert_eq!(config.severity_override(&rule("task-name")), None);

    assert_eq!(config.policy.pipeline.secret_keywords, vec!["password", "vault"]);
    assert_eq!(config.policy.gitops.application_dirs, vec!["deploy/argocd"]);
    assert!(!config.policy.gitops.skip_bootstrap);
    // Sections not mentioned keep their defaults
    assert_eq!(config.policy.gitops.ownership_value, "apps-root");
    assert_eq!(config.policy.supply_chain.history_file, "CHANGELOG.md");
    assert!(!config.policy.sensitive_files.use_git);
}

#[test]
fn test_config_rejects_version() {
    let result = Config::load(fixture_path("invalid_version.toml"));
    assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("version")));
}

#[test]
fn test_config_rejects_syntax() {
    let result = Config::load(fixture_path("invalid_syntax.toml"));
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_config_missing_file_is_io_error() {
    let result = Config::load(fixture_path("does_not_exist.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_config_rejects_fixed_severity_override() {
    let result = Config::load(fixture_path("fixed_severity.toml"));
    assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("skip-reconcile")));
}

#[test]
fn test_config_rejects_invalid_regex() {
    let result = Config::load(fixture_path("invalid_regex.toml"));
    assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("(unclosed")));
}

#[test]
fn test_unknown_rule_rejected_by_registry() {
    let config = Config::load(fixture_path("unknown_rule.toml")).unwrap();
    let result = RuleRegistry::from_config(&config, &RuleFamily::all());
    assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("no-such-rule")));
}

#[test]
fn test_disabled_family_is_not_run() {
    let config = Config::load(fixture_path("valid_full.toml")).unwrap();
    let registry = RuleRegistry::from_config(&config, &RuleFamily::all()).unwrap();
    assert!(!registry.is_active(DocumentKind::Terraform));
    assert!(registry.is_active(DocumentKind::Pipeline));
}

#[test]
fn test_policy_tables_reach_rules() {
    let config = Config::load(fixture_path("valid_full.toml")).unwrap();
    let repo = TestRepo::new();
    repo.write(
        "apps/argocd/applications/web.yaml",
        "kind: Application\nmetadata:\n  labels:\n    app.kubernetes.io/part-of: apps-root\n",
    )
    .write(
        "deploy/argocd/api.yaml",
        "kind: Application\nmetadata:\n  labels:\n    app.kubernetes.io/part-of: apps-root\n",
    );
    let result = repo.run_with(&config, &[RuleFamily::Gitops], false);
    let misplaced: Vec<Option<&str>> = result
        .findings
        .iter()
        .filter(|f| f.rule_id.as_str() == "application-path")
        .map(|f| f.path())
        .collect();
    assert_eq!(misplaced, vec![Some("apps/argocd/applications/web.yaml")]);
    assert!(
        result
            .findings
            .iter()
            .any(|f| f.message == "ArgoCD Application manifest outside allowed directories: deploy/argocd")
    );
}

#[test]
fn test_severity_override_changes_exit_code() {
    let config = Config::load(fixture_path("valid_full.toml")).unwrap();
    let repo = TestRepo::new();
    repo.write(
        ".github/workflows/ci.yml",
        "jobs:\n  b:\n    steps:\n      - uses: actions/checkout@v4\n",
    );
    let result = repo.run_with(&config, &[RuleFamily::Workflow], false);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].severity, Severity::Error);
    assert_eq!(result.exit_code, 1);
}
