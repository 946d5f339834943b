#![forbid(unsafe_code)]

//! infraguard: policy guard for infrastructure-as-code repositories
//!
//! infraguard scans a repository for Ansible playbooks, Kubernetes manifests,
//! CI workflows, Dockerfiles, Helm chart values and Terraform lab files, and
//! reports policy findings: unpinned images and actions, plain secrets,
//! non-idempotent tasks, misplaced ArgoCD Applications and committed
//! credentials. Documents are parsed structurally when possible and checked
//! line by line when they are not.

pub mod cli;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod output;
pub mod rules;
pub mod types;

// Re-export error types for convenient access
pub use error::{ConfigError, GuardError, LoadError, UsageError};

// Re-export core domain types for convenient access
pub use types::{DocumentKind, GlobPattern, RuleFamily, RuleId, Severity, StructuralPath};
