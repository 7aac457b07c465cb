//! Descriptive metadata for a document
//!
//! A descriptor lists the nodes a document is expected to carry. It is not a
//! validator: the only behavior attached to it is that required nodes with a
//! default get filled in when the document is saved.

use crate::error::{StashError, StashResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Metadata for one addressed node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorNode {
    /// Address of the node (`a.b`, `list[0]`, or a plain key for properties files)
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional nodes are never synthesized
    #[serde(default)]
    pub optional: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl DescriptorNode {
    /// A required node that is written with `default` when absent
    pub fn required(path: impl Into<String>, default: Value) -> Self {
        Self {
            path: path.into(),
            title: None,
            description: None,
            optional: false,
            default: Some(default),
        }
    }

    /// An optional node, documented but never synthesized
    pub fn optional(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: None,
            description: None,
            optional: true,
            default: None,
        }
    }
}

/// Ordered list of described nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default)]
    pub nodes: Vec<DescriptorNode>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: DescriptorNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Parse a descriptor from JSON text
    pub fn from_json(text: &str) -> StashResult<Self> {
        serde_json::from_str(text).map_err(|e| StashError::DescriptorInvalid(e.to_string()))
    }

    /// Parse a descriptor from YAML text
    pub fn from_yaml(text: &str) -> StashResult<Self> {
        serde_yaml::from_str(text).map_err(|e| StashError::DescriptorInvalid(e.to_string()))
    }

    /// Read a descriptor file, choosing the parser from the extension
    pub fn from_file(path: &Path) -> StashResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StashError::io(format!("reading descriptor {}", path.display()), e)
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&text),
            _ => Self::from_json(&text),
        }
    }

    /// Look up a node by its address
    pub fn node(&self, path: &str) -> Option<&DescriptorNode> {
        self.nodes.iter().find(|node| node.path == path)
    }

    /// Required nodes that carry a default, in declaration order
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.nodes
            .iter()
            .filter(|node| !node.optional)
            .filter_map(|node| node.default.as_ref().map(|value| (node.path.as_str(), value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_skip_optional_nodes() {
        let descriptor = Descriptor::new()
            .with_node(DescriptorNode::required("server.port", json!(8080)))
            .with_node(DescriptorNode::optional("server.host"))
            .with_node(DescriptorNode::required("name", json!("app")));

        let defaults: Vec<_> = descriptor.defaults().map(|(path, _)| path).collect();
        assert_eq!(defaults, vec!["server.port", "name"]);
    }

    #[test]
    fn parse_yaml_descriptor() {
        let yaml = r#"
nodes:
  - path: java.path
    title: Java executable
    default: /usr/bin/java
  - path: java.args
    optional: true
"#;
        let descriptor = Descriptor::from_yaml(yaml).unwrap();
        assert_eq!(descriptor.nodes.len(), 2);
        assert!(descriptor.nodes[1].optional);
        assert_eq!(descriptor.defaults().count(), 1);
        assert_eq!(
            descriptor.node("java.path").unwrap().title.as_deref(),
            Some("Java executable")
        );
    }

    #[test]
    fn parse_json_descriptor() {
        let descriptor =
            Descriptor::from_json(r#"{"nodes":[{"path":"a","default":1}]}"#).unwrap();
        assert_eq!(descriptor.node("a").unwrap().default, Some(json!(1)));
        assert!(Descriptor::from_json("[").is_err());
    }
}
