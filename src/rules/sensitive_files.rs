//! Files that must never be committed

use crate::config::SensitiveFilesPolicy;
use crate::engine::file_walker::FileWalker;
use crate::error::ConfigError;
use crate::rules::rule::{Finding, RepoContext, RepoRule, RuleInfo};
use crate::types::{GlobPattern, RuleFamily, Severity};
use regex::RegexSet;

pub fn repo_rules(policy: &SensitiveFilesPolicy) -> Result<Vec<Box<dyn RepoRule>>, ConfigError> {
    Ok(vec![Box::new(SensitiveFileRule::new(policy)?)])
}

fn regex_set(patterns: &[String]) -> Result<RegexSet, ConfigError> {
    RegexSet::new(patterns)
        .map_err(|e| ConfigError::Validation(format!("Invalid sensitive file pattern: {}", e)))
}

pub struct SensitiveFileRule {
    info: RuleInfo,
    patterns: RegexSet,
    ignore: RegexSet,
}

impl SensitiveFileRule {
    pub fn new(policy: &SensitiveFilesPolicy) -> Result<Self, ConfigError> {
        Ok(Self {
            info: RuleInfo::new(
                "sensitive-file",
                RuleFamily::SensitiveFiles,
                Severity::Error,
                "Credentials, state and unsealed secrets stay out of version control",
            ),
            patterns: regex_set(&policy.patterns)?,
            ignore: regex_set(&policy.ignore)?,
        })
    }

    pub fn is_sensitive(&self, rel_path: &str) -> bool {
        self.patterns.is_match(rel_path) && !self.ignore.is_match(rel_path)
    }

    /// Tracked files when git can tell, every non-skipped file otherwise
    fn candidates(&self, ctx: &RepoContext<'_>) -> Vec<String> {
        if let Some(files) = ctx.lister.list_files(ctx.root) {
            return files;
        }
        let walker = match FileWalker::new(ctx.root, &[GlobPattern::new("*")], ctx.skip.clone()) {
            Ok(walker) => walker,
            Err(e) => {
                log::warn!("Cannot enumerate files for sensitive file check: {}", e);
                return Vec::new();
            }
        };
        match walker.enumerate() {
            Ok(paths) => paths
                .iter()
                .map(|p| crate::document::loader::relative_display(ctx.root, p))
                .collect(),
            Err(e) => {
                log::warn!("Cannot enumerate files for sensitive file check: {}", e);
                Vec::new()
            }
        }
    }
}

impl RepoRule for SensitiveFileRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &RepoContext<'_>) -> Vec<Finding> {
        self.candidates(ctx)
            .into_iter()
            .filter(|path| self.is_sensitive(path))
            .map(|path| {
                self.info
                    .finding(format!("Sensitive file must not be committed: {}", path))
                    .at(path, None, None)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::external::{FileLister, NoLister};
    use crate::engine::file_walker::SkipPolicy;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct FixedLister(Vec<&'static str>);

    impl FileLister for FixedLister {
        fn list_files(&self, _root: &Path) -> Option<Vec<String>> {
            Some(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    fn rule() -> SensitiveFileRule {
        SensitiveFileRule::new(&SensitiveFilesPolicy::default()).unwrap()
    }

    #[test]
    fn test_sensitive_patterns() {
        let rule = rule();
        assert!(rule.is_sensitive(".env"));
        assert!(rule.is_sensitive("ansible/op.env"));
        assert!(rule.is_sensitive("home/kubeconfig"));
        assert!(rule.is_sensitive("keys/id_ed25519"));
        assert!(rule.is_sensitive("terraform/envs/lab/terraform.tfstate"));
        assert!(rule.is_sensitive("terraform/envs/lab/secrets.auto.tfvars"));
        assert!(rule.is_sensitive("apps/user/db/db-unsealed.yaml"));

        assert!(!rule.is_sensitive("terraform/envs/lab/defaults.auto.tfvars"));
        assert!(!rule.is_sensitive("apps/cluster/sealed-secrets/key.key"));
        assert!(!rule.is_sensitive("apps/user/db/db.sealedsecret.yaml"));
        assert!(!rule.is_sensitive("ansible/roles/web/tasks/config.yaml"));
        assert!(!rule.is_sensitive("README.md"));
    }

    #[test]
    fn test_uses_lister_when_available() {
        let temp = TempDir::new().unwrap();
        let skip = SkipPolicy::from_config(&Config::default(), false).unwrap();
        let lister = FixedLister(vec!["README.md", "deploy/tls.key"]);
        let ctx = RepoContext {
            root: temp.path(),
            strict: false,
            lister: &lister,
            skip: &skip,
        };
        let findings = rule().evaluate(&ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Sensitive file must not be committed: deploy/tls.key"
        );
        assert_eq!(findings[0].path(), Some("deploy/tls.key"));
    }

    #[test]
    fn test_falls_back_to_walk() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join(".env"), "TOKEN=x").unwrap();
        fs::write(root.join("node_modules/pkg/.env"), "TOKEN=x").unwrap();
        fs::write(root.join("main.tf"), "").unwrap();

        let skip = SkipPolicy::from_config(&Config::default(), false).unwrap();
        let ctx = RepoContext {
            root,
            strict: false,
            lister: &NoLister,
            skip: &skip,
        };
        let paths: Vec<String> = rule()
            .evaluate(&ctx)
            .iter()
            .filter_map(|f| f.path().map(str::to_string))
            .collect();
        assert_eq!(paths, vec![".env".to_string()]);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let policy = SensitiveFilesPolicy {
            patterns: vec!["(".to_string()],
            ..SensitiveFilesPolicy::default()
        };
        assert!(matches!(
            SensitiveFileRule::new(&policy),
            Err(ConfigError::Validation(_))
        ));
    }
}
