//! YAML encoding, converted to the JSON tree at the load/save boundary

use super::json::{object_root, Json};
use super::{DocumentFormat, Encoding};
use crate::error::StashResult;
use crate::path::PathError;
use serde_json::Value;

/// YAML documents sharing addressing and mutation with [`Json`]
pub struct Yaml;

impl Encoding for Yaml {
    type Tree = Value;

    const FORMAT: DocumentFormat = DocumentFormat::Yaml;

    fn empty() -> Self::Tree {
        Json::empty()
    }

    fn parse(text: &str) -> StashResult<Self::Tree> {
        if text.trim().is_empty() {
            return Ok(Json::empty());
        }
        object_root(serde_yaml::from_str(text)?)
    }

    fn render(tree: &Self::Tree) -> StashResult<String> {
        Ok(serde_yaml::to_string(tree)?)
    }

    fn get(tree: &Self::Tree, address: &str) -> Option<Value> {
        Json::get(tree, address)
    }

    fn set(tree: &mut Self::Tree, address: &str, value: Option<Value>) -> Result<(), PathError> {
        Json::set(tree, address, value)
    }

    fn to_value(tree: &Self::Tree) -> Value {
        tree.clone()
    }
}
