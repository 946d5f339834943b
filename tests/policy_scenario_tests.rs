//! End-to-end policy scenarios over temporary repositories
//!
//! Each test lays out a small repository, runs the engine for the relevant
//! rule families and checks the exact findings and exit code.

mod common;

use common::{TestRepo, fallback_config, findings_of, rule_ids};
use infraguard::engine::{EXIT_CLEAN, EXIT_FINDINGS};
use infraguard::types::{RuleFamily, Severity};
use std::collections::BTreeSet;

const WORKFLOW: &str = "name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: make test
";

#[test]
fn test_unpinned_action_is_one_warning() {
    let repo = TestRepo::new();
    repo.write(".github/workflows/ci.yml", WORKFLOW);
    let result = repo.run(&[RuleFamily::Workflow], false);

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Warning);
    assert_eq!(finding.message, "Action not pinned to SHA: actions/checkout@v4");
    assert_eq!(finding.path(), Some(".github/workflows/ci.yml"));
    assert_eq!(finding.line(), Some(7));
    assert_eq!(result.exit_code, EXIT_CLEAN);
}

#[test]
fn test_sha_pinned_action_is_clean() {
    let repo = TestRepo::new();
    repo.write(
        ".github/workflows/ci.yml",
        &WORKFLOW.replace("@v4", "@8f4b7f84864484a7bf31766abe9204da3cbe65b3"),
    );
    let result = repo.run(&[RuleFamily::Workflow], true);
    assert!(result.findings.is_empty());
    assert_eq!(result.exit_code, EXIT_CLEAN);
}

#[test]
fn test_latest_chart_tag_is_error() {
    let repo = TestRepo::new();
    repo.write(
        "apps/user/web/values.yaml",
        "image:\n  repository: foo\n  tag: \"latest\"\n",
    );
    let result = repo.run(&[RuleFamily::ChartValues], false);

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].severity, Severity::Error);
    assert_eq!(
        result.findings[0].message,
        "Using 'latest' tag is prohibited: foo"
    );
    assert_eq!(result.exit_code, EXIT_FINDINGS);
}

#[test]
fn test_image_reference_totality() {
    // (values body, expected finding) for: digest, empty tag, latest, other tag
    let cases: [(&str, Option<(Severity, &str)>); 5] = [
        (
            "image:\n  repository: foo\n  tag: \"1.0\"\n  digest: sha256:abc123\n",
            None,
        ),
        (
            "image:\n  repository: foo\n  tag: \"\"\n",
            Some((Severity::Error, "Missing tag for image: foo")),
        ),
        (
            "image:\n  repository: foo\n",
            Some((Severity::Error, "Missing tag for image: foo")),
        ),
        (
            "image:\n  repository: foo\n  tag: LaTeSt\n",
            Some((Severity::Error, "Using 'latest' tag is prohibited: foo")),
        ),
        (
            "image:\n  repository: foo\n  tag: \"1.2.3\"\n",
            Some((Severity::Warning, "Image tag not pinned by digest: foo:1.2.3")),
        ),
    ];

    for (body, expected) in cases {
        for config in [infraguard::config::Config::default(), fallback_config()] {
            let repo = TestRepo::new();
            repo.write("charts/web/values.yaml", body);
            let result = repo.run_with(&config, &[RuleFamily::ChartValues], false);
            let got: Vec<(Severity, &str)> = result
                .findings
                .iter()
                .map(|f| (f.severity, f.message.as_str()))
                .collect();
            let want: Vec<(Severity, &str)> = expected.into_iter().collect();
            assert_eq!(
                got, want,
                "body {:?} fallback={}",
                body, config.guard.fallback_only
            );
        }
    }
}

#[test]
fn test_plain_secret_and_sealed_marker() {
    let secret = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: db\nstringData:\n  password: hunter2\n";
    let repo = TestRepo::new();
    repo.write("apps/user/db/secret.yaml", secret);
    let result = repo.run(&[RuleFamily::Gitops], false);
    let plain = findings_of(&result, "plain-secret");
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].severity, Severity::Error);
    assert_eq!(plain[0].message, "Plain Secret found; use SealedSecrets");
    assert_eq!(result.exit_code, EXIT_FINDINGS);

    let sealed = format!(
        "{}---\napiVersion: bitnami.com/v1alpha1\nkind: SealedSecret\nmetadata:\n  name: db\n",
        secret
    );
    let repo = TestRepo::new();
    repo.write("apps/user/db/secret.yaml", &sealed);
    let result = repo.run(&[RuleFamily::Gitops], false);
    assert!(findings_of(&result, "plain-secret").is_empty());
    assert_eq!(result.exit_code, EXIT_CLEAN);
}

#[test]
fn test_shell_pipe_without_pipefail() {
    let playbook = "- hosts: all
  tasks:
    - name: Count hosts
      ansible.builtin.shell: cat /etc/hosts | wc -l
      changed_when: false
";
    let repo = TestRepo::new();
    repo.write("site.yml", playbook);
    let result = repo.run(&[RuleFamily::Pipeline], false);
    assert_eq!(rule_ids(&result), vec!["shell-pipefail"]);
    assert_eq!(result.findings[0].severity, Severity::Warning);
    assert_eq!(
        result.findings[0].message,
        "Shell task with pipes missing \"set -euo pipefail\""
    );
    assert_eq!(result.exit_code, EXIT_CLEAN);

    let repo = TestRepo::new();
    repo.write(
        "site.yml",
        &playbook.replace("cat /etc/hosts", "set -euo pipefail && cat /etc/hosts"),
    );
    let result = repo.run(&[RuleFamily::Pipeline], true);
    assert!(result.findings.is_empty());
}

#[test]
fn test_secret_leak_needs_no_log() {
    let playbook = "- hosts: db
  tasks:
    - name: Set database password
      ansible.builtin.set_fact:
        db_password: \"{{ vault_db_password }}\"
";
    let repo = TestRepo::new();
    repo.write("playbooks/db.yml", playbook);
    let result = repo.run(&[RuleFamily::Pipeline], false);
    let leaks = findings_of(&result, "no-log-secrets");
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].severity, Severity::Warning);
    assert_eq!(result.findings.len(), 1);

    let repo = TestRepo::new();
    repo.write(
        "playbooks/db.yml",
        &format!("{}      no_log: true\n", playbook),
    );
    let result = repo.run(&[RuleFamily::Pipeline], false);
    assert!(result.findings.is_empty());
}

#[test]
fn test_role_task_list_recurses_into_blocks() {
    let repo = TestRepo::new();
    repo.write(
        "roles/web/tasks/main.yml",
        "- name: Configure
  block:
    - ansible.builtin.command: /usr/bin/reload
      register: reload_out
",
    );
    let result = repo.run(&[RuleFamily::Pipeline], false);
    let ids = rule_ids(&result);
    assert!(ids.contains(&"task-name"));
    assert!(ids.contains(&"changed-when"));
    let structural = result.findings[0]
        .location
        .as_ref()
        .and_then(|l| l.structural.clone())
        .unwrap();
    assert_eq!(structural, "tasks[0].block[0]");
}

#[test]
fn test_exit_code_follows_severity_and_strict() {
    // Warning only: passes unless strict
    let repo = TestRepo::new();
    repo.write("Dockerfile", "FROM alpine:3.19\n");
    assert_eq!(repo.run(&[RuleFamily::BuildFile], false).exit_code, EXIT_CLEAN);
    assert_eq!(repo.run(&[RuleFamily::BuildFile], true).exit_code, EXIT_FINDINGS);

    // Error: fails either way
    let repo = TestRepo::new();
    repo.write("apps/user/db/secret.yaml", "kind: Secret\n");
    assert_eq!(repo.run(&[RuleFamily::Gitops], false).exit_code, EXIT_FINDINGS);
    assert_eq!(repo.run(&[RuleFamily::Gitops], true).exit_code, EXIT_FINDINGS);

    // Clean: passes either way
    let repo = TestRepo::new();
    repo.write(
        "Dockerfile",
        "FROM alpine:3.19@sha256:c5b1261d6d3e43071626931fc004f70149baeba2c8ec672bd4f27761f8e1ad6b\n",
    );
    assert_eq!(repo.run(&[RuleFamily::BuildFile], true).exit_code, EXIT_CLEAN);
}

#[test]
fn test_fallback_and_structured_agree() {
    let repo = TestRepo::new();
    repo.write(".github/workflows/ci.yml", WORKFLOW)
        .write(
            "apps/user/web/values.yaml",
            "image:\n  repository: ghcr.io/acme/web\n  tag: \"2.0\"\nsidecar:\n  image:\n    repository: busybox\n    tag: latest\n",
        )
        .write(
            "apps/user/db/secret.yaml",
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: db\n  annotations:\n    argocd.argoproj.io/skip-reconcile: \"true\"\n",
        )
        .write(
            "apps/argocd/applications/web.yaml",
            "apiVersion: argoproj.io/v1alpha1\nkind: Application\nmetadata:\n  name: web\nspec:\n  source:\n    chart: web\n",
        )
        .write(
            "apps/user/api/values.yaml",
            "image:\n  tag: latest\n  repository: acme/api\n",
        )
        .write(
            "apps/user/jobs/values.yaml",
            "image:\n  repository: acme/jobs\nschedule: \"@daily\"\n",
        );

    let families = [
        RuleFamily::Workflow,
        RuleFamily::ChartValues,
        RuleFamily::Gitops,
    ];
    let structured = repo.run(&families, false);
    let fallback = repo.run_with(&fallback_config(), &families, false);

    let ids = |result: &infraguard::engine::RunResult| -> BTreeSet<String> {
        result
            .findings
            .iter()
            .map(|f| f.rule_id.to_string())
            .collect()
    };
    assert_eq!(ids(&structured), ids(&fallback));

    let images = |result: &infraguard::engine::RunResult| -> Vec<(Option<String>, Severity, String)> {
        findings_of(result, "image-pin")
            .iter()
            .map(|f| (f.path().map(str::to_string), f.severity, f.message.clone()))
            .collect()
    };
    assert_eq!(images(&structured), images(&fallback));
    assert_eq!(images(&structured).len(), 4);
    assert!(
        images(&fallback)
            .iter()
            .any(|(_, _, m)| m == "Using 'latest' tag is prohibited: acme/api")
    );
    assert!(
        images(&fallback)
            .iter()
            .any(|(_, _, m)| m == "Missing tag for image: acme/jobs")
    );
    assert!(ids(&structured).contains("application-label"));
    assert!(ids(&structured).contains("application-chart"));
    assert!(ids(&structured).contains("skip-reconcile"));
    assert!(structured.documents.iter().all(|d| d.structured));
    assert!(fallback.documents.iter().all(|d| !d.structured));
}

#[test]
fn test_broken_yaml_reports_once_and_keeps_going() {
    let repo = TestRepo::new();
    repo.write("apps/user/web/values.yaml", "image:\n  repository: foo\n  tag: [latest\n")
        .write("apps/user/api/values.yaml", "image:\n  repository: api\n  tag: \"1.0\"\n");
    let result = repo.run(&[RuleFamily::ChartValues], false);

    let parse = findings_of(&result, "yaml-parse");
    assert_eq!(parse.len(), 1);
    assert_eq!(parse[0].path(), Some("apps/user/web/values.yaml"));
    assert!(parse[0].message.starts_with("Invalid YAML:"));
    assert_eq!(findings_of(&result, "image-pin").len(), 2);
    assert_eq!(result.documents.len(), 2);
}

#[test]
fn test_history_file_is_reported_once() {
    let repo = TestRepo::new();
    repo.write("Dockerfile", "FROM scratch\n")
        .write("build/Dockerfile", "FROM scratch\n");
    let result = repo.run(&RuleFamily::supply_chain(), false);
    let history = findings_of(&result, "history-file");
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].message,
        "docs/history.md missing (used to document tag usage/exceptions)"
    );

    repo.write("docs/history.md", "# History\n");
    let result = repo.run(&RuleFamily::supply_chain(), false);
    assert!(result.findings.is_empty());
}

#[test]
fn test_repeated_runs_are_identical() {
    let repo = TestRepo::new();
    repo.write(".github/workflows/ci.yml", WORKFLOW)
        .write("Dockerfile", "FROM node:20 AS build\nFROM build\n")
        .write("site.yml", "- hosts: all\n  tasks:\n    - shell: echo hi > /tmp/x\n");
    let first = repo.run(&RuleFamily::all(), true);
    let second = repo.run(&RuleFamily::all(), true);
    assert_eq!(first.findings, second.findings);
    assert_eq!(first.documents, second.documents);
}

#[test]
fn test_chart_templates_are_checked_line_by_line() {
    let repo = TestRepo::new();
    repo.write(
        "apps/user/web/Chart.yaml",
        "apiVersion: v2\nname: web\nversion: 0.1.0\n",
    )
    .write(
        "apps/user/web/templates/deployment.yaml",
        "{{- if .Values.enabled }}\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {{ .Release.Name }}\n{{- end }}\n",
    );
    let result = repo.run(&RuleFamily::all(), false);
    assert!(findings_of(&result, "yaml-parse").is_empty());
    assert_eq!(result.exit_code, EXIT_CLEAN);
    let template = result
        .documents
        .iter()
        .find(|d| d.path == "apps/user/web/templates/deployment.yaml")
        .unwrap();
    assert!(!template.structured);
    assert!(template.load_error.is_none());

    // Line rules still see what a template renders
    repo.write(
        "apps/user/web/templates/secret.yaml",
        "apiVersion: v1\nkind: Secret\nmetadata:\n  name: {{ .Release.Name }}-db\n",
    );
    let result = repo.run(&[RuleFamily::Gitops], false);
    assert_eq!(rule_ids(&result), vec!["plain-secret"]);
    assert_eq!(
        result.findings[0].path(),
        Some("apps/user/web/templates/secret.yaml")
    );
}
