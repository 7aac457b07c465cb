//! JSON tree encoding
//!
//! The root is always an object. Loading replaces the whole tree; saving
//! writes the whole tree pretty-printed.

use super::{DocumentFormat, Encoding};
use crate::either::Either;
use crate::error::{StashError, StashResult};
use crate::path::{self, PathError};
use serde_json::{Map, Value};

/// JSON documents addressed with the path grammar
pub struct Json;

impl Encoding for Json {
    type Tree = Value;

    const FORMAT: DocumentFormat = DocumentFormat::Json;

    fn empty() -> Self::Tree {
        Value::Object(Map::new())
    }

    fn parse(text: &str) -> StashResult<Self::Tree> {
        object_root(serde_json::from_str(text)?)
    }

    fn render(tree: &Self::Tree) -> StashResult<String> {
        let mut text = serde_json::to_string_pretty(tree)?;
        text.push('\n');
        Ok(text)
    }

    fn get(tree: &Self::Tree, address: &str) -> Option<Value> {
        path::resolve(tree, address).cloned()
    }

    fn set(tree: &mut Self::Tree, address: &str, value: Option<Value>) -> Result<(), PathError> {
        path::ensure_and_set(tree, address, value.map(Either::Left))?;
        Ok(())
    }

    fn to_value(tree: &Self::Tree) -> Value {
        tree.clone()
    }
}

/// Accept only object roots; an empty document counts as an empty object
pub(crate) fn object_root(value: Value) -> StashResult<Value> {
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Array(_) => Err(StashError::DocumentRoot("array")),
        Value::String(_) => Err(StashError::DocumentRoot("string")),
        Value::Number(_) => Err(StashError::DocumentRoot("number")),
        Value::Bool(_) => Err(StashError::DocumentRoot("bool")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_requires_object_root() {
        assert!(Json::parse(r#"{"a": 1}"#).is_ok());
        assert!(Json::parse("[1, 2]").is_err());
        assert!(Json::parse("{broken").is_err());
    }

    #[test]
    fn render_is_pretty() {
        let text = Json::render(&json!({"a": {"b": 1}})).unwrap();
        assert_eq!(text, "{\n  \"a\": {\n    \"b\": 1\n  }\n}\n");
    }

    #[test]
    fn addressed_access() {
        let mut tree = Json::parse(r#"{"list": [1, 2, 3]}"#).unwrap();
        Json::set(&mut tree, "list[-1]", Some(json!(9))).unwrap();
        assert_eq!(Json::get(&tree, "list[-1]"), Some(json!(9)));
        assert!(Json::set(&mut tree, "list[", Some(json!(0))).is_err());
    }

    #[test]
    fn key_order_is_preserved() {
        let tree = Json::parse(r#"{"z": 1, "a": 2}"#).unwrap();
        let text = Json::render(&tree).unwrap();
        assert!(text.find("\"z\"").unwrap() < text.find("\"a\"").unwrap());
    }
}
