//! Generic document tree with best-effort line provenance
//!
//! Every YAML dialect is converted into [`Node`] so rules match exhaustively on
//! a closed set of shapes. Conversion goes through `serde_yaml::Value`, which
//! expands aliases, so trees are always acyclic.

use serde_yaml::Value;
use std::fmt::Write as _;

/// A scalar leaf
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    /// Numbers as rendered by the parser
    Number(String),
    Bool(bool),
}

impl Scalar {
    /// The string payload, only for string scalars
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render any scalar as text
    pub fn render(&self) -> String {
        match self {
            Scalar::String(s) => s.clone(),
            Scalar::Number(n) => n.clone(),
            Scalar::Bool(b) => b.to_string(),
        }
    }

    /// YAML 1.1 style truthiness (`true`, `yes`, `on`, `1`)
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Number(n) => n == "1",
            Scalar::String(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            ),
        }
    }
}

/// Ordered mapping; keys are unique and keep source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
}

impl Mapping {
    pub fn new(entries: Vec<(String, Node)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
    Null,
}

/// One node of a document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// 1-based source line, when it could be located
    pub line: Option<u32>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, line: None }
    }

    pub fn with_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    pub fn null() -> Self {
        Self::new(NodeKind::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Scalar(Scalar::String(value.into())))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match &self.kind {
            NodeKind::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// The string payload of a string scalar
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    /// Mapping lookup; `None` for any other shape
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Lookup along a chain of mapping keys
    pub fn get_path(&self, keys: &[&str]) -> Option<&Node> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    /// Scalar rendered as text, or `None` for containers and null
    pub fn scalar_text(&self) -> Option<String> {
        self.as_scalar().map(Scalar::render)
    }

    /// Flattened text of keys and scalar values, used for keyword searches
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Mapping(m) => {
                for (key, value) in m.iter() {
                    let _ = write!(out, "{key}: ");
                    value.write_text(out);
                    out.push(' ');
                }
            }
            NodeKind::Sequence(items) => {
                for item in items {
                    item.write_text(out);
                    out.push(' ');
                }
            }
            NodeKind::Scalar(s) => out.push_str(&s.render()),
            NodeKind::Null => {}
        }
    }

    /// Convert a parsed YAML value, assigning lines through `locator`
    pub fn from_yaml(value: &Value, locator: &mut LineLocator<'_>) -> Node {
        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::new(NodeKind::Scalar(Scalar::Bool(*b))),
            Value::Number(n) => Node::new(NodeKind::Scalar(Scalar::Number(n.to_string()))),
            Value::String(s) => Node::string(s.clone()),
            Value::Tagged(tagged) => Node::from_yaml(&tagged.value, locator),
            Value::Sequence(items) => {
                let items: Vec<Node> = items
                    .iter()
                    .map(|item| Node::from_yaml(item, locator))
                    .collect();
                let line = items.iter().find_map(|item| item.line);
                Node::new(NodeKind::Sequence(items)).with_line(line)
            }
            Value::Mapping(mapping) => {
                let mut entries = Vec::with_capacity(mapping.len());
                for (key, value) in mapping {
                    let key = key_to_string(key);
                    let key_line = locator.locate_key(&key);
                    let child = Node::from_yaml(value, locator);
                    let line = key_line.or(child.line);
                    entries.push((key, child.with_line(line)));
                }
                let line = entries.first().and_then(|(_, node)| node.line);
                Node::new(NodeKind::Mapping(Mapping::new(entries))).with_line(line)
            }
        }
    }
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Tagged(tagged) => key_to_string(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Forward-only search for the source line of each mapping key
///
/// Keys are visited in document order, so the cursor only moves forward. A key
/// that cannot be found (flow style, unusual quoting) gets no line and leaves
/// the cursor in place.
pub struct LineLocator<'a> {
    lines: Vec<&'a str>,
    cursor: usize,
}

impl<'a> LineLocator<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            cursor: 0,
        }
    }

    pub fn locate_key(&mut self, key: &str) -> Option<u32> {
        let found = (self.cursor..self.lines.len()).find(|&idx| line_declares_key(self.lines[idx], key))?;
        self.cursor = found + 1;
        u32::try_from(found + 1).ok()
    }
}

fn line_declares_key(line: &str, key: &str) -> bool {
    let mut rest = line.trim_start();
    while let Some(stripped) = rest.strip_prefix("- ") {
        rest = stripped.trim_start();
    }
    if rest == "-" {
        return false;
    }

    let after = if let Some(r) = rest.strip_prefix(key) {
        r
    } else if let Some(r) = rest
        .strip_prefix('"')
        .and_then(|r| r.strip_prefix(key))
        .and_then(|r| r.strip_prefix('"'))
    {
        r
    } else if let Some(r) = rest
        .strip_prefix('\'')
        .and_then(|r| r.strip_prefix(key))
        .and_then(|r| r.strip_prefix('\''))
    {
        r
    } else {
        return false;
    };

    match after.strip_prefix(':') {
        Some(tail) => tail.is_empty() || tail.starts_with(' ') || tail.starts_with('\t'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Node {
        let value: Value = serde_yaml::from_str(text).unwrap();
        let mut locator = LineLocator::new(text);
        Node::from_yaml(&value, &mut locator)
    }

    #[test]
    fn test_mapping_preserves_order_and_lines() {
        let node = parse("zeta: 1\nalpha:\n  nested: true\nmid: x\n");
        let mapping = node.as_mapping().unwrap();
        let keys: Vec<&str> = mapping.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        assert_eq!(node.line, Some(1));
        assert_eq!(node.get("alpha").unwrap().line, Some(2));
        assert_eq!(node.get_path(&["alpha", "nested"]).unwrap().line, Some(3));
        assert_eq!(node.get("mid").unwrap().line, Some(4));
    }

    #[test]
    fn test_sequence_items_take_dash_line() {
        let text = "- name: first\n  shell: echo\n- name: second\n";
        let node = parse(text);
        let items = node.as_sequence().unwrap();
        assert_eq!(items[0].line, Some(1));
        assert_eq!(items[1].line, Some(3));
        assert_eq!(items[0].get("shell").unwrap().line, Some(2));
    }

    #[test]
    fn test_quoted_keys_are_located() {
        let node = parse("\"image\": nginx\n'tag': v1\n");
        assert_eq!(node.get("image").unwrap().line, Some(1));
        assert_eq!(node.get("tag").unwrap().line, Some(2));
    }

    #[test]
    fn test_key_prefix_does_not_match_longer_key() {
        assert!(!line_declares_key("tags: [a]", "tag"));
        assert!(line_declares_key("  tag: v1", "tag"));
        assert!(line_declares_key("- - tag:", "tag"));
        assert!(!line_declares_key("tag:value", "tag"));
    }

    #[test]
    fn test_scalars_and_truthiness() {
        let node = parse("a: yes\nb: 1\nc: true\nd: off\ne: 1.10\n");
        assert!(node.get("a").unwrap().as_scalar().unwrap().is_truthy());
        assert!(node.get("b").unwrap().as_scalar().unwrap().is_truthy());
        assert!(node.get("c").unwrap().as_scalar().unwrap().is_truthy());
        assert!(!node.get("d").unwrap().as_scalar().unwrap().is_truthy());
        assert_eq!(node.get("e").unwrap().scalar_text().unwrap(), "1.1");
    }

    #[test]
    fn test_tagged_values_unwrap() {
        let node = parse("secret: !vault |\n  abc\n");
        assert_eq!(node.get("secret").unwrap().as_str(), Some("abc\n"));
    }

    #[test]
    fn test_text_flattens_keys_and_values() {
        let node = parse("name: Set db password\nuser:\n  name: app\n");
        let text = node.text();
        assert!(text.contains("password"));
        assert!(text.contains("user:"));
        assert!(text.contains("app"));
    }
}
