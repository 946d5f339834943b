//! Configuration file parsing and validation

pub mod guard_toml;
pub mod policy;

pub use guard_toml::{CONFIG_FILE_NAME, Config, GuardSettings, RuleSettings, RuleValue};
pub use policy::{
    GitopsPolicy, PipelinePolicy, Policy, SensitiveFilesPolicy, SupplyChainPolicy,
    TerraformPolicy,
};
