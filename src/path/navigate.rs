//! Resolving and mutating nodes of a JSON tree by address
//!
//! Both walks are iterative over the parsed segments. Reads never fail:
//! anything missing, wrong-typed or malformed resolves to `None`. Writes
//! create intermediate objects as needed and reject malformed addresses.

use super::{PathAddress, PathError, Segment};
use crate::either::Either;
use serde_json::{Map, Value};

/// A value to write, either given directly or produced on demand
pub type NodeValue = Either<Value, Box<dyn FnOnce() -> Value + Send>>;

/// Resolve `address` inside `tree`
pub fn resolve<'a>(tree: &'a Value, address: &str) -> Option<&'a Value> {
    let address = PathAddress::parse(address).ok()?;
    let mut node = tree;
    for segment in address.segments() {
        let child = node.as_object()?.get(&segment.key)?;
        node = match segment.index {
            None => child,
            Some(index) => {
                let array = child.as_array()?;
                &array[position(index, array.len())?]
            }
        };
    }
    Some(node)
}

/// Mutable counterpart of [`resolve`]
pub fn resolve_mut<'a>(tree: &'a mut Value, address: &str) -> Option<&'a mut Value> {
    let address = PathAddress::parse(address).ok()?;
    let mut node = tree;
    for segment in address.segments() {
        node = child_mut(node, segment)?;
    }
    Some(node)
}

/// Write `value` at `address`, creating intermediate objects on the way.
///
/// `None` removes the addressed node from its parent. Returns the written
/// node, or `None` after a removal.
pub fn ensure_and_set<'a>(
    tree: &'a mut Value,
    address: &str,
    value: Option<NodeValue>,
) -> Result<Option<&'a mut Value>, PathError> {
    let address = PathAddress::parse(address)?;
    let (parents, last) = address.split_last();

    let Some(value) = value else {
        remove(tree, parents, last);
        return Ok(None);
    };

    let mut node = tree;
    for segment in parents {
        node = descend_or_create(node, segment);
    }

    let map = ensure_object(node);
    let value = value.either(|v| v, |factory| factory());
    match last.index {
        None => {
            map.insert(last.key.clone(), value);
            Ok(map.get_mut(&last.key))
        }
        Some(index) => {
            let array = ensure_array(map, &last.key);
            let slot = locate_or_insert(array, index, || Value::Null);
            array[slot] = value;
            Ok(array.get_mut(slot))
        }
    }
}

/// Resolve a possibly negative index against an array length
fn position(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

/// Find the slot for a write, growing the array when the index is out of range.
///
/// Negative indices below the valid range insert at the front; indices at or
/// past the end append.
fn locate_or_insert(array: &mut Vec<Value>, index: i64, fill: impl FnOnce() -> Value) -> usize {
    if let Some(slot) = position(index, array.len()) {
        return slot;
    }
    if index < 0 {
        array.insert(0, fill());
        0
    } else {
        array.push(fill());
        array.len() - 1
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    let child = node.as_object_mut()?.get_mut(&segment.key)?;
    match segment.index {
        None => Some(child),
        Some(index) => {
            let array = child.as_array_mut()?;
            let slot = position(index, array.len())?;
            array.get_mut(slot)
        }
    }
}

fn descend_or_create<'a>(node: &'a mut Value, segment: &Segment) -> &'a mut Value {
    let map = ensure_object(node);
    let child = match segment.index {
        None => map.entry(segment.key.clone()).or_insert(Value::Null),
        Some(index) => {
            let array = ensure_array(map, &segment.key);
            let slot = locate_or_insert(array, index, || Value::Object(Map::new()));
            &mut array[slot]
        }
    };
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    child
}

fn remove(tree: &mut Value, parents: &[Segment], last: &Segment) {
    let mut node = tree;
    for segment in parents {
        match child_mut(node, segment) {
            Some(child) => node = child,
            None => return,
        }
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };
    match last.index {
        None => {
            map.shift_remove(&last.key);
        }
        Some(index) => {
            if let Some(array) = map.get_mut(&last.key).and_then(Value::as_array_mut) {
                if let Some(slot) = position(index, array.len()) {
                    array.remove(slot);
                }
            }
        }
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn ensure_array<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Vec<Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(array) => array,
        _ => unreachable!("slot was just replaced with an array"),
    }
}
