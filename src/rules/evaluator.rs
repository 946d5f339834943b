//! Per-kind recursion strategies
//!
//! An evaluator decides *where* in a document rules are applied: every task of
//! a playbook, every document of a manifest stream, every mapping of a values
//! file. Rules decide *what* is wrong at each site.

use crate::document::{Document, Node, NodeKind, segments};
use crate::engine::file_walker::is_bootstrap;
use crate::types::{DocumentKind, StructuralPath};

/// Keys that hold nested task lists
const TASK_SECTIONS: &[&str] = &["tasks", "handlers", "pre_tasks", "post_tasks"];
const BLOCK_SECTIONS: &[&str] = &["block", "rescue", "always"];

/// Keys whose sub-trees describe one image reference
pub const IMAGE_KEYS: &[&str] = &["image", "repository", "tag", "digest"];

/// A place in a tree where rules run
pub type Site<'a> = (StructuralPath, &'a Node);

pub trait Evaluator: Send + Sync {
    fn kind(&self) -> DocumentKind;

    /// Whether the document is checked at all
    fn applies(&self, _document: &Document) -> bool {
        true
    }

    /// Whether line-based fallback evaluation is meaningful for this kind
    fn supports_fallback(&self) -> bool {
        true
    }

    /// Evaluation sites of a parsed document, in document order
    fn sites<'a>(&self, trees: &'a [Node]) -> Vec<Site<'a>>;
}

/// Plays and role task lists, recursing into block/rescue/always
pub struct PipelineEvaluator;

impl PipelineEvaluator {
    fn collect_tasks<'a>(tasks: &'a Node, path: StructuralPath, out: &mut Vec<Site<'a>>) {
        let Some(items) = tasks.as_sequence() else {
            return;
        };
        for (idx, task) in items.iter().enumerate() {
            if task.as_mapping().is_none() {
                continue;
            }
            let task_path = path.index(idx);
            out.push((task_path.clone(), task));
            for section in BLOCK_SECTIONS {
                if let Some(nested) = task.get(section) {
                    Self::collect_tasks(nested, task_path.key(section), out);
                }
            }
        }
    }

    fn is_play(node: &Node) -> bool {
        node.as_mapping().is_some_and(|m| {
            m.contains_key("hosts")
                || m.contains_key("import_playbook")
                || TASK_SECTIONS.iter().any(|s| m.contains_key(s))
        })
    }
}

impl Evaluator for PipelineEvaluator {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pipeline
    }

    fn supports_fallback(&self) -> bool {
        false
    }

    fn sites<'a>(&self, trees: &'a [Node]) -> Vec<Site<'a>> {
        let mut sites = Vec::new();
        for tree in trees {
            let Some(items) = tree.as_sequence() else {
                continue;
            };
            if items.iter().any(Self::is_play) {
                for (play_idx, play) in items.iter().enumerate() {
                    if play.as_mapping().is_none() {
                        continue;
                    }
                    let play_path = StructuralPath::root().item("play", play_idx);
                    for section in TASK_SECTIONS {
                        if let Some(tasks) = play.get(section) {
                            Self::collect_tasks(tasks, play_path.key(section), &mut sites);
                        }
                    }
                }
            } else {
                Self::collect_tasks(tree, StructuralPath::root().key("tasks"), &mut sites);
            }
        }
        sites
    }
}

/// One site per manifest document
pub struct ManifestEvaluator {
    pub skip_bootstrap: bool,
}

impl Evaluator for ManifestEvaluator {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Manifest
    }

    fn applies(&self, document: &Document) -> bool {
        !(self.skip_bootstrap && is_bootstrap(&segments(&document.rel_path)))
    }

    fn sites<'a>(&self, trees: &'a [Node]) -> Vec<Site<'a>> {
        trees
            .iter()
            .enumerate()
            .filter(|(_, tree)| !tree.is_null())
            .map(|(idx, tree)| (StructuralPath::root().item("doc", idx), tree))
            .collect()
    }
}

/// Every mapping in the tree, so `uses:` is found at any depth
pub struct WorkflowEvaluator;

fn collect_mappings<'a>(node: &'a Node, path: StructuralPath, skip: &[&str], out: &mut Vec<Site<'a>>) {
    match &node.kind {
        NodeKind::Mapping(mapping) => {
            out.push((path.clone(), node));
            for (key, value) in mapping.iter() {
                if skip.contains(&key) {
                    continue;
                }
                collect_mappings(value, path.key(key), skip, out);
            }
        }
        NodeKind::Sequence(items) => {
            for (idx, item) in items.iter().enumerate() {
                collect_mappings(item, path.index(idx), skip, out);
            }
        }
        NodeKind::Scalar(_) | NodeKind::Null => {}
    }
}

impl Evaluator for WorkflowEvaluator {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Workflow
    }

    fn sites<'a>(&self, trees: &'a [Node]) -> Vec<Site<'a>> {
        let mut sites = Vec::new();
        for tree in trees {
            collect_mappings(tree, StructuralPath::root(), &[], &mut sites);
        }
        sites
    }
}

/// Every mapping outside already-classified image keys
pub struct ChartValuesEvaluator;

impl Evaluator for ChartValuesEvaluator {
    fn kind(&self) -> DocumentKind {
        DocumentKind::ChartValues
    }

    fn sites<'a>(&self, trees: &'a [Node]) -> Vec<Site<'a>> {
        let mut sites = Vec::new();
        for tree in trees {
            collect_mappings(tree, StructuralPath::root(), IMAGE_KEYS, &mut sites);
        }
        sites
    }
}

/// Line-oriented kinds have no tree; rules see the whole document once
pub struct LineEvaluator(pub DocumentKind);

impl Evaluator for LineEvaluator {
    fn kind(&self) -> DocumentKind {
        self.0
    }

    fn sites<'a>(&self, _trees: &'a [Node]) -> Vec<Site<'a>> {
        Vec::new()
    }
}

/// Evaluator for a document kind
pub fn evaluator_for(kind: DocumentKind, skip_bootstrap: bool) -> Box<dyn Evaluator> {
    match kind {
        DocumentKind::Pipeline => Box::new(PipelineEvaluator),
        DocumentKind::Manifest => Box::new(ManifestEvaluator { skip_bootstrap }),
        DocumentKind::Workflow => Box::new(WorkflowEvaluator),
        DocumentKind::ChartValues => Box::new(ChartValuesEvaluator),
        DocumentKind::Dockerfile | DocumentKind::Terraform => Box::new(LineEvaluator(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::loader::parse_yaml;

    fn paths(sites: &[Site<'_>]) -> Vec<String> {
        sites.iter().map(|(p, _)| p.as_str().to_string()).collect()
    }

    #[test]
    fn test_pipeline_sites_recurse_into_blocks() {
        let trees = parse_yaml(
            r#"
- hosts: all
  pre_tasks:
    - name: prep
      ping:
  tasks:
    - name: a
      debug: {}
    - block:
        - name: inner
          debug: {}
      rescue:
        - name: recover
          debug: {}
  handlers:
    - name: restart
      service: {}
"#,
        )
        .unwrap();
        let sites = PipelineEvaluator.sites(&trees);
        assert_eq!(
            paths(&sites),
            vec![
                "play[0].tasks[0]",
                "play[0].tasks[1]",
                "play[0].tasks[1].block[0]",
                "play[0].tasks[1].rescue[0]",
                "play[0].handlers[0]",
                "play[0].pre_tasks[0]",
            ]
        );
    }

    #[test]
    fn test_pipeline_sites_for_task_list() {
        let trees = parse_yaml("- name: one\n  debug: {}\n- name: two\n  debug: {}\n").unwrap();
        let sites = PipelineEvaluator.sites(&trees);
        assert_eq!(paths(&sites), vec!["tasks[0]", "tasks[1]"]);
    }

    #[test]
    fn test_manifest_sites_per_document() {
        let trees = parse_yaml("kind: A\n---\n---\nkind: B\n").unwrap();
        let sites = ManifestEvaluator {
            skip_bootstrap: true,
        }
        .sites(&trees);
        let names: Vec<String> = paths(&sites);
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "doc[0]");
    }

    #[test]
    fn test_chart_values_walk_skips_image_keys() {
        let trees = parse_yaml(
            r#"
image:
  repository: foo
  tag: "1.0"
sidecar:
  image:
    repository: bar
"#,
        )
        .unwrap();
        let sites = ChartValuesEvaluator.sites(&trees);
        assert_eq!(paths(&sites), vec!["", "sidecar"]);
    }

    #[test]
    fn test_workflow_sites_reach_steps() {
        let trees = parse_yaml(
            "jobs:\n  build:\n    steps:\n      - uses: actions/checkout@v4\n",
        )
        .unwrap();
        let sites = WorkflowEvaluator.sites(&trees);
        assert!(paths(&sites).contains(&"jobs.build.steps[0]".to_string()));
    }
}
