#![forbid(unsafe_code)]

//! Rule catalogue formatters for the `list` command

use crate::config::Config;
use crate::rules::RuleInfo;
use serde::Serialize;

/// One catalogue row as shown by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleListing {
    pub id: String,
    /// Family name, `core` for rules outside every family
    pub family: String,
    /// Severity after configuration overrides
    pub severity: String,
    pub enabled: bool,
    pub description: String,
}

impl RuleListing {
    /// Describe `info` as `config` would run it
    pub fn new(info: &RuleInfo, config: &Config) -> Self {
        let enabled = match info.family {
            Some(family) => config.family_enabled(family) && config.rule_enabled(&info.id),
            None => true,
        };
        let severity = config.severity_override(&info.id).unwrap_or(info.severity);
        Self {
            id: info.id.to_string(),
            family: info
                .family
                .map(|f| f.as_str().to_string())
                .unwrap_or_else(|| "core".to_string()),
            severity: severity.as_str().to_string(),
            enabled,
            description: info.description.to_string(),
        }
    }
}

/// Human-readable formatter for the rule catalogue
pub struct RuleListHumanFormatter;

impl RuleListHumanFormatter {
    pub fn new() -> Self {
        RuleListHumanFormatter
    }

    pub fn format(&self, rules: &[RuleListing]) -> String {
        let enabled = rules.iter().filter(|r| r.enabled).count();
        let mut output = format!("Rules ({} of {} enabled):\n\n", enabled, rules.len());
        for rule in rules {
            let marker = if rule.enabled { "✓" } else { "✗" };
            output.push_str(&format!("{} {} [{}]\n", marker, rule.id, rule.family));
            output.push_str(&format!("  {}\n", rule.description));
            output.push_str(&format!("  Severity: {}\n\n", rule.severity));
        }
        output
    }
}

impl Default for RuleListHumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON formatter for the rule catalogue: one array, pretty-printed
pub struct RuleListJsonFormatter;

impl RuleListJsonFormatter {
    pub fn new() -> Self {
        RuleListJsonFormatter
    }

    pub fn format(&self, rules: &[RuleListing]) -> Result<String, serde_json::Error> {
        let mut output = serde_json::to_string_pretty(rules)?;
        output.push('\n');
        Ok(output)
    }
}

impl Default for RuleListJsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}
