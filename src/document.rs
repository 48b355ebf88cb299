//! Document assembly and YAML emission.
//!
//! The generated file carries a comment above every update entry and above the
//! `registries` section. `serde_yaml_ng` has no notion of comments, so the
//! document is serialized to a [`Value`] tree and written by a small block-style
//! emitter that consults an [`Annotations`] side table keyed by top-level key
//! and by position in `updates`.

use crate::models::{DependabotConfig, UpdateEntry};
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use regex::Regex;
use serde_yaml_ng::{Mapping, Value};
use std::sync::LazyLock;

const KEY_UPDATES: &str = "updates";
const KEY_REGISTRIES: &str = "registries";
const REGISTRIES_ANNOTATION: &str = " Registry configurations";

const INDENT: usize = 2;

/// Plain scalars a YAML 1.1 reader would resolve to something other than a
/// string: booleans, null, ints, floats, sexagesimals, timestamps.
static IMPLICIT_SCALAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"y|Y|yes|Yes|YES|n|N|no|No|NO|true|True|TRUE|false|False|FALSE",
        r"|on|On|ON|off|Off|OFF|null|Null|NULL|~",
        r"|[-+]?[0-9][0-9_]*",
        r"|[-+]?0b[01_]+|[-+]?0x[0-9a-fA-F_]+|[-+]?0o[0-7_]+",
        r"|[-+]?(?:[0-9][0-9_]*)?\.[0-9_]*(?:[eE][-+]?[0-9]+)?",
        r"|[-+]?[0-9][0-9_]*(?:\.[0-9_]*)?[eE][-+]?[0-9]+",
        r"|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN)",
        r"|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+(?:\.[0-9_]*)?",
        r"|[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}(?:[Tt ].*)?",
        r")$"
    ))
    .expect("Invalid implicit scalar regex")
});

/// Comments attached to the document, rendered as `#<text>` on their own line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    keys: IndexMap<String, String>,
    entries: Vec<String>,
}

impl Annotations {
    /// Comment placed above a top-level key.
    pub fn for_key(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    /// Comment placed above the `index`-th update entry.
    pub fn for_entry(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }
}

/// Annotation for one update entry: `" <dir> <ecosystem> <kind> updates"`.
///
/// `<dir>` is the directory with surrounding slashes trimmed, or `/` for the
/// repository root.
pub fn entry_annotation(entry: &UpdateEntry) -> String {
    let trimmed = entry.directory.trim_matches('/');
    let directory = if trimmed.is_empty() { "/" } else { trimmed };
    format!(
        " {} {} {} updates",
        directory,
        entry.package_ecosystem,
        entry.kind.as_str()
    )
}

/// The output document together with its comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    config: DependabotConfig,
    annotations: Annotations,
}

impl Document {
    /// Wrap the final entry list and optional registries section.
    pub fn assemble(
        updates: Vec<UpdateEntry>,
        registries: Option<IndexMap<String, IndexMap<String, Value>>>,
    ) -> Self {
        let mut annotations = Annotations {
            entries: updates.iter().map(entry_annotation).collect(),
            ..Annotations::default()
        };
        if registries.is_some() {
            annotations
                .keys
                .insert(KEY_REGISTRIES.to_string(), REGISTRIES_ANNOTATION.to_string());
        }

        let mut config = DependabotConfig::new(updates);
        config.registries = registries;

        Self {
            config,
            annotations,
        }
    }

    pub fn config(&self) -> &DependabotConfig {
        &self.config
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Render the full document text.
    pub fn render(&self) -> Result<String> {
        let value = serde_yaml_ng::to_value(&self.config)
            .context("Failed to serialize dependabot configuration")?;
        let Value::Mapping(root) = value else {
            bail!("dependabot configuration did not serialize to a mapping");
        };

        let mut emitter = Emitter::default();
        for (key, value) in &root {
            let key_text = key.as_str().unwrap_or_default();
            if let Some(comment) = self.annotations.for_key(key_text) {
                emitter.comment(0, comment);
            }

            if key_text == KEY_UPDATES {
                let comments: Vec<Option<&str>> = (0..self.config.updates.len())
                    .map(|i| self.annotations.for_entry(i))
                    .collect();
                emitter.pair(0, key, value, &comments)?;
            } else {
                emitter.pair(0, key, value, &[])?;
            }
        }

        Ok(emitter.out)
    }
}

#[derive(Default)]
struct Emitter {
    out: String,
}

impl Emitter {
    fn comment(&mut self, indent: usize, text: &str) {
        self.out.push_str(&" ".repeat(indent));
        self.out.push('#');
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn pair(
        &mut self,
        indent: usize,
        key: &Value,
        value: &Value,
        item_comments: &[Option<&str>],
    ) -> Result<()> {
        self.out.push_str(&" ".repeat(indent));
        self.out.push_str(&scalar(key)?);
        self.out.push(':');

        match untag(value) {
            Value::Mapping(map) if !map.is_empty() => {
                self.out.push('\n');
                self.mapping(indent + INDENT, map)
            }
            Value::Sequence(items) if !items.is_empty() => {
                self.out.push('\n');
                self.sequence(indent + INDENT, items, item_comments)
            }
            other => {
                self.out.push(' ');
                self.out.push_str(&scalar(other)?);
                self.out.push('\n');
                Ok(())
            }
        }
    }

    fn mapping(&mut self, indent: usize, map: &Mapping) -> Result<()> {
        for (key, value) in map {
            self.pair(indent, key, value, &[])?;
        }
        Ok(())
    }

    fn sequence(&mut self, indent: usize, items: &[Value], comments: &[Option<&str>]) -> Result<()> {
        for (index, item) in items.iter().enumerate() {
            if let Some(Some(comment)) = comments.get(index) {
                self.comment(indent, comment);
            }

            match untag(item) {
                Value::Mapping(map) if !map.is_empty() => {
                    self.nested_item(indent, |e| e.mapping(indent + INDENT, map))?;
                }
                Value::Sequence(inner) if !inner.is_empty() => {
                    self.nested_item(indent, |e| e.sequence(indent + INDENT, inner, &[]))?;
                }
                other => {
                    self.out.push_str(&" ".repeat(indent));
                    self.out.push_str("- ");
                    self.out.push_str(&scalar(other)?);
                    self.out.push('\n');
                }
            }
        }
        Ok(())
    }

    /// Render a collection item at `indent + 2` and pull its first line up
    /// behind the `- ` marker.
    fn nested_item<F>(&mut self, indent: usize, render: F) -> Result<()>
    where
        F: FnOnce(&mut Emitter) -> Result<()>,
    {
        let mut body = Emitter::default();
        render(&mut body)?;
        body.out.replace_range(indent..indent + INDENT, "- ");
        self.out.push_str(&body.out);
        Ok(())
    }
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => {
            tracing::warn!(tag = %tagged.tag, "Dropping YAML tag from emitted value");
            untag(&tagged.value)
        }
        other => other,
    }
}

/// Inline text of a scalar, or of an empty collection.
fn scalar(value: &Value) -> Result<String> {
    Ok(match untag(value) {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format_string(s),
        Value::Sequence(items) if items.is_empty() => "[]".to_string(),
        Value::Mapping(map) if map.is_empty() => "{}".to_string(),
        other => bail!("cannot emit {:?} inline", other),
    })
}

/// A string as a plain scalar when that reads back unchanged, else double-quoted.
pub fn format_string(s: &str) -> String {
    if needs_quotes(s) {
        quote(s)
    } else {
        s.to_string()
    }
}

fn needs_quotes(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return true;
    };

    first.is_whitespace()
        || s.ends_with(char::is_whitespace)
        || "-?:,[]{}#&*!|>'\"%@`".contains(first)
        || s.ends_with(':')
        || s.contains(": ")
        || s.contains(" #")
        || s.contains(['{', '}', '[', ']', ','])
        || s.chars().any(|c| c.is_control())
        || IMPLICIT_SCALAR.is_match(s)
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
