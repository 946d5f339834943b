//! Traversal, rule execution and finding aggregation

pub mod aggregator;
pub mod executor;
pub mod external;
pub mod file_walker;

pub use aggregator::{
    DocumentInfo, EXIT_CLEAN, EXIT_FINDINGS, RunResult, SeverityCounts, aggregate, exit_code,
};
pub use executor::{ExecutionEngine, Target};
pub use external::{FileLister, GitLsFiles, NoLister};
pub use file_walker::{FileWalker, SkipPolicy, resolve};
