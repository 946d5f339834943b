//! Parsing and validation for infraguard.toml configuration files

use crate::config::policy::Policy;
use crate::error::ConfigError;
use crate::types::{GlobPattern, RuleFamily, RuleId, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up at the repository root when `--config` is not given
pub const CONFIG_FILE_NAME: &str = "infraguard.toml";

/// Rules whose severity is fixed and cannot be overridden
const FIXED_SEVERITY_RULES: &[&str] = &["skip-reconcile", "yaml-parse"];

/// Main configuration struct for infraguard.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Run-wide settings
    pub guard: GuardSettings,

    /// Family toggles; absent families are enabled
    #[serde(default)]
    pub families: BTreeMap<RuleFamily, bool>,

    /// Per-rule toggles and severity overrides
    #[serde(default)]
    pub rules: BTreeMap<RuleId, RuleValue>,

    /// Rule tables
    #[serde(default)]
    pub policy: Policy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            guard: GuardSettings::default(),
            families: BTreeMap::new(),
            rules: BTreeMap::new(),
            policy: Policy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for a repository
    ///
    /// An explicit path must exist; otherwise `<repo>/infraguard.toml` is used
    /// when present, and built-in defaults when not.
    pub fn discover(repo: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let candidate: Option<PathBuf> = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default_path = repo.join(CONFIG_FILE_NAME);
                default_path.is_file().then_some(default_path)
            }
        };

        match candidate {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => {
                log::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                Ok(Self::default())
            }
        }
    }

    /// Whether a rule family is enabled
    pub fn family_enabled(&self, family: RuleFamily) -> bool {
        self.families.get(&family).copied().unwrap_or(true)
    }

    /// Whether a rule is enabled (rules are on unless set to `false`)
    pub fn rule_enabled(&self, rule_id: &RuleId) -> bool {
        !matches!(self.rules.get(rule_id), Some(RuleValue::Enabled(false)))
    }

    /// Severity override for a rule, if configured
    pub fn severity_override(&self, rule_id: &RuleId) -> Option<Severity> {
        match self.rules.get(rule_id) {
            Some(RuleValue::Settings(settings)) => settings.severity,
            _ => None,
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.guard.version != "1" {
            return Err(ConfigError::Validation(format!(
                "Unsupported configuration version '{}'. Expected '1'",
                self.guard.version
            )));
        }

        if self.guard.max_file_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_file_bytes must be greater than zero".to_string(),
            ));
        }

        for pattern in &self.guard.exclude {
            globset::Glob::new(pattern.as_str()).map_err(|e| {
                ConfigError::Validation(format!(
                    "Invalid exclude glob pattern '{}': {}",
                    pattern.as_str(),
                    e
                ))
            })?;
        }

        for pattern in &self.policy.supply_chain.dockerfile_names {
            globset::Glob::new(pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "Invalid dockerfile name pattern '{}': {}",
                    pattern, e
                ))
            })?;
        }

        let sensitive = &self.policy.sensitive_files;
        for pattern in sensitive.patterns.iter().chain(sensitive.ignore.iter()) {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "Invalid sensitive file pattern '{}': {}",
                    pattern, e
                ))
            })?;
        }

        for (rule_id, value) in &self.rules {
            if let RuleValue::Settings(settings) = value
                && settings.severity.is_some()
                && FIXED_SEVERITY_RULES.contains(&rule_id.as_str())
            {
                return Err(ConfigError::Validation(format!(
                    "Severity of rule '{}' cannot be overridden",
                    rule_id
                )));
            }
        }

        Ok(())
    }
}

/// `[guard]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Configuration version (must be "1")
    pub version: String,

    /// Directory names pruned from every walk
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// Extra glob patterns (repo-relative) excluded from scanning
    #[serde(default)]
    pub exclude: Vec<GlobPattern>,

    /// Files larger than this are reported instead of read
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Skip structured parsing and evaluate with the line scanner only
    #[serde(default)]
    pub fallback_only: bool,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            skip_dirs: default_skip_dirs(),
            exclude: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            fallback_only: false,
        }
    }
}

fn default_skip_dirs() -> Vec<String> {
    [
        ".git",
        ".venv",
        ".terraform",
        ".terragrunt-cache",
        "node_modules",
        ".cache",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    5 * 1024 * 1024
}

/// A rule can be enabled with a boolean or configured with settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    /// Simple boolean enable/disable
    Enabled(bool),
    /// Settings table for the rule
    Settings(RuleSettings),
}

/// Settings for individual rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Severity level reported for this rule's findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}
