//! Line-oriented `key=value` encoding
//!
//! Lines starting with `#` or `!` are comments, kept with their original
//! line number and written back at the same position. Lines without `=` are
//! dropped. The first `=` splits key from value; the rest of the line is the
//! value verbatim. When a key repeats, only its first occurrence is kept.

use super::{DocumentFormat, Encoding};
use crate::error::StashResult;
use crate::path::PathError;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parsed properties file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesTree {
    entries: IndexMap<String, String>,
    comments: BTreeMap<usize, String>,
}

impl PropertiesTree {
    pub fn parse(text: &str) -> Self {
        let mut tree = Self::default();
        for (line_no, line) in text.lines().enumerate() {
            if line.starts_with('#') || line.starts_with('!') {
                tree.comments.insert(line_no, line.to_string());
            } else if let Some((key, value)) = line.split_once('=') {
                tree.entries
                    .entry(key.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
        tree
    }

    /// Interleave comments at their recorded line numbers with entries in
    /// their current order
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut entries = self.entries.iter();
        let last_comment = self.comments.keys().next_back().copied();
        let mut line_no = 0;

        loop {
            if let Some(comment) = self.comments.get(&line_no) {
                out.push_str(comment);
                out.push('\n');
            } else if let Some((key, value)) = entries.next() {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            } else if !last_comment.is_some_and(|last| line_no < last) {
                break;
            }
            line_no += 1;
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set or (with `None`) remove a key. Existing keys keep their position.
    pub fn set(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.entries.insert(key.to_string(), value);
            }
            None => {
                self.entries.shift_remove(key);
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Comment lines keyed by their original line number
    pub fn comments(&self) -> &BTreeMap<usize, String> {
        &self.comments
    }
}

/// `key=value` files with positional comments
pub struct Properties;

impl Encoding for Properties {
    type Tree = PropertiesTree;

    const FORMAT: DocumentFormat = DocumentFormat::Properties;

    fn empty() -> Self::Tree {
        PropertiesTree::default()
    }

    fn parse(text: &str) -> StashResult<Self::Tree> {
        Ok(PropertiesTree::parse(text))
    }

    fn render(tree: &Self::Tree) -> StashResult<String> {
        Ok(tree.render())
    }

    fn get(tree: &Self::Tree, address: &str) -> Option<Value> {
        tree.get(address).map(|value| Value::String(value.to_string()))
    }

    fn set(tree: &mut Self::Tree, address: &str, value: Option<Value>) -> Result<(), PathError> {
        let value = value.map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        });
        tree.set(address, value);
        Ok(())
    }

    fn to_value(tree: &Self::Tree) -> Value {
        let map: Map<String, Value> = tree
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}
