//! Line-oriented view of a document
//!
//! Used for build files and Terraform sources, and as the fallback for YAML
//! that failed to parse. Rules ask the same kinds of questions they ask of a
//! tree: does a line start with, contain, or match something, and how deeply
//! is it indented.

use regex::Regex;

/// A document as an ordered sequence of text lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineScanner {
    lines: Vec<String>,
}

impl LineScanner {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    /// Line text by 1-based number
    pub fn line(&self, number: u32) -> Option<&str> {
        let idx = usize::try_from(number).ok()?.checked_sub(1)?;
        self.lines.get(idx).map(String::as_str)
    }

    /// All lines with their 1-based numbers
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(idx, line)| (line_number(idx), line.as_str()))
    }

    /// Lines whose text, ignoring leading whitespace, starts with `prefix`
    pub fn starting_with<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (u32, &'a str)> {
        self.iter()
            .filter(move |(_, line)| line.trim_start().starts_with(prefix))
    }

    /// Lines containing `needle`
    pub fn containing<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = (u32, &'a str)> {
        self.iter().filter(move |(_, line)| line.contains(needle))
    }

    /// Lines matching `pattern`
    pub fn matching<'a>(&'a self, pattern: &'a Regex) -> impl Iterator<Item = (u32, &'a str)> {
        self.iter().filter(move |(_, line)| pattern.is_match(line))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.containing(needle).next().is_some()
    }

    pub fn is_match(&self, pattern: &Regex) -> bool {
        self.matching(pattern).next().is_some()
    }

    /// Width of the leading space run of a line
    pub fn indent(line: &str) -> usize {
        line.len() - line.trim_start_matches(' ').len()
    }

    /// Split a `key: value` line, dropping sequence markers, quotes and trailing comments
    ///
    /// `"  - uses: actions/checkout@v4 # pinned later"` yields `("uses", "actions/checkout@v4")`.
    pub fn key_value(line: &str) -> Option<(&str, &str)> {
        let mut rest = line.trim_start();
        while let Some(stripped) = rest.strip_prefix("- ") {
            rest = stripped.trim_start();
        }
        if rest.starts_with('#') {
            return None;
        }

        let (key, value) = rest.split_once(':')?;
        if !(value.is_empty() || value.starts_with(' ') || value.starts_with('\t')) {
            return None;
        }
        let key = unquote(key.trim());
        if key.is_empty() || key.contains(' ') {
            return None;
        }

        let value = strip_comment(value.trim());
        Some((key, unquote(value)))
    }
}

fn line_number(idx: usize) -> u32 {
    u32::try_from(idx + 1).unwrap_or(u32::MAX)
}

fn strip_comment(value: &str) -> &str {
    if let Some(quote) = value.bytes().next().filter(|b| matches!(b, b'"' | b'\''))
        && let Some(end) = closing_quote(value, quote)
    {
        return &value[..=end];
    }
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end(),
        None if value.starts_with('#') => "",
        None => value,
    }
}

/// Byte offset of the quote that closes a scalar opened at offset 0
fn closing_quote(value: &str, quote: u8) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b if b == quote && quote == b'\'' && bytes.get(i + 1) == Some(&quote) => i += 2,
            b if b == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
