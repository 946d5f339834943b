//! Test utilities for infraguard integration tests

#![allow(dead_code)]

use infraguard::config::Config;
use infraguard::document::Loader;
use infraguard::engine::{ExecutionEngine, RunResult, SkipPolicy};
use infraguard::rules::RuleRegistry;
use infraguard::types::RuleFamily;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A throwaway repository on disk
pub struct TestRepo {
    pub dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `rel`, creating parent directories
    pub fn write(&self, rel: &str, content: &str) -> &Self {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    pub fn mkdir(&self, rel: &str) -> &Self {
        fs::create_dir_all(self.dir.path().join(rel)).unwrap();
        self
    }

    /// Run `families` over the repository with the default configuration
    pub fn run(&self, families: &[RuleFamily], strict: bool) -> RunResult {
        self.run_with(&Config::default(), families, strict)
    }

    pub fn run_with(&self, config: &Config, families: &[RuleFamily], strict: bool) -> RunResult {
        engine(config, families, strict).run(self.path()).unwrap()
    }
}

pub fn engine(config: &Config, families: &[RuleFamily], strict: bool) -> ExecutionEngine {
    let registry = RuleRegistry::from_config(config, families).unwrap();
    let loader = Loader::new(config).unwrap();
    let skip = SkipPolicy::from_config(config, false).unwrap();
    ExecutionEngine::new(registry, loader, skip, strict)
}

/// Rule ids of the findings, in report order
pub fn rule_ids(result: &RunResult) -> Vec<&str> {
    result.findings.iter().map(|f| f.rule_id.as_str()).collect()
}

/// Findings of one rule
pub fn findings_of<'a>(
    result: &'a RunResult,
    rule_id: &str,
) -> Vec<&'a infraguard::rules::Finding> {
    result
        .findings
        .iter()
        .filter(|f| f.rule_id.as_str() == rule_id)
        .collect()
}

/// Configuration that forces every document through the line scanner
pub fn fallback_config() -> Config {
    let mut config = Config::default();
    config.guard.fallback_only = true;
    config
}
