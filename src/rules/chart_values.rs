//! Helm values image pinning
//!
//! Two shapes are recognised: `repository`/`tag` siblings in any mapping and a
//! nested `image:` key holding either a reference string or an object. Both
//! the tree walk and the line fallback feed the same classification.

use crate::document::{LineScanner, Mapping, Node};
use crate::rules::evaluator::IMAGE_KEYS;
use crate::rules::rule::{Finding, Rule, RuleContext, RuleInfo};
use crate::types::{DocumentKind, RuleFamily, Severity, StructuralPath};

const KINDS: &[DocumentKind] = &[DocumentKind::ChartValues];

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![Box::new(ImagePinRule::new())]
}

/// Image coordinates pulled out of a values file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: Option<&str>, digest: Option<&str>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.map(str::to_string),
            digest: digest.map(str::to_string),
        }
    }

    /// Split an `image:` reference string such as `ghcr.io/org/app:1.2@sha256:…`
    pub fn parse(reference: &str) -> Self {
        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) => (name, Some(digest)),
            None => (reference, None),
        };
        let last_slash = name.rfind('/').map_or(0, |i| i + 1);
        match name[last_slash..].rfind(':') {
            Some(colon) => {
                let split = last_slash + colon;
                Self::new(&name[..split], Some(&name[split + 1..]), digest)
            }
            None => Self::new(name, None, digest),
        }
    }

    fn with_registry(mut self, registry: Option<&str>) -> Self {
        if let Some(registry) = registry.map(str::trim).filter(|r| !r.is_empty()) {
            self.repository = format!("{}/{}", registry.trim_end_matches('/'), self.repository);
        }
        self
    }

    fn has_digest(&self) -> bool {
        self.digest.as_deref().is_some_and(|d| !d.trim().is_empty())
            || self
                .tag
                .as_deref()
                .is_some_and(|t| t.contains('@') || t.contains("sha256:"))
            || self.repository.contains("@sha256:")
    }
}

/// Outcome of classifying one image reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pinned,
    Latest,
    MissingTag,
    Unpinned,
}

/// Every reference maps to exactly one verdict
pub fn classify(image: &ImageRef) -> Verdict {
    if image.has_digest() {
        return Verdict::Pinned;
    }
    match image.tag.as_deref().map(str::trim) {
        None | Some("") => Verdict::MissingTag,
        Some(tag) if tag.eq_ignore_ascii_case("latest") => Verdict::Latest,
        Some(_) => Verdict::Unpinned,
    }
}

pub struct ImagePinRule {
    info: RuleInfo,
}

impl ImagePinRule {
    pub fn new() -> Self {
        Self {
            info: RuleInfo::new(
                "image-pin",
                RuleFamily::ChartValues,
                Severity::Warning,
                "Chart images must be pinned by digest, never by latest",
            ),
        }
    }

    fn finding(&self, image: &ImageRef) -> Option<Finding> {
        let finding = match classify(image) {
            Verdict::Pinned => return None,
            Verdict::Latest => self
                .info
                .finding(format!("Using 'latest' tag is prohibited: {}", image.repository))
                .with_severity(Severity::Error),
            Verdict::MissingTag => self
                .info
                .finding(format!("Missing tag for image: {}", image.repository))
                .with_severity(Severity::Error),
            Verdict::Unpinned => self.info.finding(format!(
                "Image tag not pinned by digest: {}:{}",
                image.repository,
                image.tag.as_deref().unwrap_or_default().trim()
            )),
        };
        Some(finding)
    }

    /// Image described by `repository` (+ `registry`, `tag`, `digest`) keys of one mapping
    fn from_object(mapping: &Mapping) -> Option<(ImageRef, Option<u32>)> {
        let repository = mapping.get("repository")?;
        let name = repository.scalar_text()?;
        let text = |key: &str| mapping.get(key).and_then(Node::scalar_text);
        let tag = text("tag");
        let digest = text("digest");
        let registry = text("registry");
        let line = mapping
            .get("tag")
            .and_then(|t| t.line)
            .or(repository.line);
        let image = ImageRef::new(name, tag.as_deref(), digest.as_deref()).with_registry(registry.as_deref());
        Some((image, line))
    }

    /// Nested `image:` objects, descending through wrappers without `repository`
    fn visit_image_object(&self, ctx: &RuleContext<'_>, node: &Node, path: StructuralPath, out: &mut Vec<Finding>) {
        let Some(mapping) = node.as_mapping() else {
            return;
        };
        if let Some((image, line)) = Self::from_object(mapping) {
            if let Some(finding) = self.finding(&image) {
                out.push(finding.at(ctx.document.rel_path.clone(), line, Some(&path)));
            }
            return;
        }
        for (key, value) in mapping.iter() {
            if !IMAGE_KEYS.contains(&key) {
                self.visit_image_object(ctx, value, path.key(key), out);
            }
        }
    }

    fn evaluate_tree(&self, ctx: &RuleContext<'_>, node: &Node) -> Vec<Finding> {
        let Some(mapping) = node.as_mapping() else {
            return Vec::new();
        };
        let mut findings = Vec::new();

        if mapping.contains_key("tag") || mapping.contains_key("digest") {
            if let Some((image, line)) = Self::from_object(mapping)
                && let Some(finding) = self.finding(&image)
            {
                findings.push(ctx.locate(finding, line));
            }
        }

        if let Some(image) = mapping.get("image") {
            if let Some(reference) = image.as_str() {
                let reference = reference.trim();
                if !reference.is_empty() && !reference.contains("{{") {
                    let parsed = ImageRef::parse(reference)
                        .with_registry(mapping.get("registry").and_then(Node::as_str));
                    if let Some(finding) = self.finding(&parsed) {
                        findings.push(ctx.locate(finding, image.line));
                    }
                }
            } else {
                self.visit_image_object(ctx, image, ctx.path.key("image"), &mut findings);
            }
        }
        findings
    }

    fn evaluate_lines(&self, ctx: &RuleContext<'_>, lines: &LineScanner) -> Vec<Finding> {
        let mut scan = LineScan::default();
        for (n, line) in lines.iter() {
            if line.trim() == "---" {
                scan.close_all();
                continue;
            }
            let Some((key, value)) = LineScanner::key_value(line) else {
                continue;
            };
            let (column, item) = key_column(line);
            scan.enter(column, item).record(key, value, n);
        }
        scan.close_all();
        scan.images
            .into_iter()
            .filter_map(|(image, line)| self.emit(ctx, image, line))
            .collect()
    }

    fn emit(&self, ctx: &RuleContext<'_>, image: ImageRef, line: u32) -> Option<Finding> {
        self.finding(&image).map(|f| ctx.locate(f, Some(line)))
    }
}

impl Default for ImagePinRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ImagePinRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn kinds(&self) -> &[DocumentKind] {
        KINDS
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if let Some(node) = ctx.node() {
            return self.evaluate_tree(ctx, node);
        }
        match ctx.lines() {
            Some(lines) => self.evaluate_lines(ctx, lines),
            None => Vec::new(),
        }
    }
}

/// Column where the key of a `key: value` line starts, past any `- ` markers,
/// and whether the line opens a sequence item
fn key_column(line: &str) -> (usize, bool) {
    let mut rest = line.trim_start();
    let mut item = false;
    while let Some(stripped) = rest.strip_prefix("- ") {
        rest = stripped.trim_start();
        item = true;
    }
    (line.len() - rest.len(), item)
}

/// How a line-scan frame is checked when it closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Scope {
    /// Ordinary mapping: sibling shape and inline `image:` references
    #[default]
    Values,
    /// Inside an `image:` object, where `repository` alone is an image
    Image,
    /// Below a key whose sub-tree is not walked, or inside a block scalar
    Skipped,
}

/// Keys of one mapping, gathered line by line in any order
#[derive(Debug, Default)]
struct Frame {
    column: usize,
    scope: Scope,
    repository: Option<(String, u32)>,
    tag: Option<(String, u32)>,
    digest: Option<String>,
    registry: Option<String>,
    inline: Option<(String, u32)>,
    /// Key of the latest line without an inline value; deeper lines belong to it
    open_key: Option<String>,
}

impl Frame {
    fn new(column: usize, scope: Scope) -> Self {
        Self {
            column,
            scope,
            ..Self::default()
        }
    }

    fn record(&mut self, key: &str, value: &str, line: u32) {
        match key {
            "repository" if !value.is_empty() => self.repository = Some((value.to_string(), line)),
            "tag" => self.tag = Some((value.to_string(), line)),
            "digest" => self.digest = Some(value.to_string()),
            "registry" => self.registry = Some(value.to_string()),
            "image" if is_reference(value) => self.inline = Some((value.to_string(), line)),
            _ => {}
        }
        self.open_key = value.is_empty().then(|| key.to_string());
    }

    /// Scope of a mapping nested under this frame's open key
    fn child_scope(&self) -> Scope {
        let Some(key) = self.open_key.as_deref() else {
            return Scope::Skipped;
        };
        match self.scope {
            Scope::Skipped => Scope::Skipped,
            Scope::Values if key == "image" => Scope::Image,
            Scope::Image if self.repository.is_some() => Scope::Skipped,
            _ if IMAGE_KEYS.contains(&key) => Scope::Skipped,
            scope => scope,
        }
    }

    /// Images this mapping describes, with their report lines
    fn images(self) -> Vec<(ImageRef, u32)> {
        let mut images = Vec::new();
        let sibling = match self.scope {
            Scope::Values => self.tag.is_some() || self.digest.is_some(),
            Scope::Image => true,
            Scope::Skipped => false,
        };
        if sibling && let Some((repository, repository_line)) = self.repository {
            let line = self.tag.as_ref().map_or(repository_line, |(_, n)| *n);
            let image = ImageRef::new(
                repository,
                self.tag.as_ref().map(|(t, _)| t.as_str()),
                self.digest.as_deref(),
            )
            .with_registry(self.registry.as_deref());
            images.push((image, line));
        }
        if self.scope == Scope::Values && let Some((reference, line)) = self.inline {
            images.push((
                ImageRef::parse(&reference).with_registry(self.registry.as_deref()),
                line,
            ));
        }
        images
    }
}

/// An inline `image:` value that names an image, not a template or flow collection
fn is_reference(value: &str) -> bool {
    !value.is_empty() && !value.contains("{{") && !value.starts_with(['{', '['])
}

/// Indentation stack standing in for the mapping tree of an unparsed file
#[derive(Debug, Default)]
struct LineScan {
    frames: Vec<Frame>,
    images: Vec<(ImageRef, u32)>,
}

impl LineScan {
    /// Frame that a key at `column` belongs to, closing the mappings it ends
    fn enter(&mut self, column: usize, item: bool) -> &mut Frame {
        while self
            .frames
            .last()
            .is_some_and(|top| top.column > column || (item && top.column == column))
        {
            self.close_top();
        }
        if self.frames.last().is_none_or(|top| top.column < column) {
            let scope = self.frames.last().map_or(Scope::Values, Frame::child_scope);
            self.frames.push(Frame::new(column, scope));
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn close_top(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.images.extend(frame.images());
        }
    }

    fn close_all(&mut self) {
        while !self.frames.is_empty() {
            self.close_top();
        }
    }
}
