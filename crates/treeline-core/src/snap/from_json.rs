//! Conversion between snapshot nodes and wire JSON.
//!
//! The wire format smuggles metadata through dot-keys: `.priority`
//! annotates a node, `.value` wraps a scalar that carries one. Arrays
//! arrive as objects keyed by decimal indices and are turned back into
//! arrays on output when the keys look densely array-like.

use serde_json::{json, Map, Value};

use crate::error::{Result, TreeError};
use crate::snap::index::Index;
use crate::snap::node::{Node, Repr, Scalar};

/// Parses wire JSON into a node. `null` parses to the empty node.
pub fn node_from_json(json: &Value) -> Result<Node> {
    node_from_json_with_priority(json, &Value::Null)
}

pub fn node_from_json_with_priority(json: &Value, priority: &Value) -> Result<Node> {
    if json.is_null() {
        return Ok(Node::empty());
    }
    let mut priority = priority;
    if let Value::Object(map) = json {
        if let Some(p) = map.get(".priority") {
            priority = p;
        }
    }
    let priority_node = parse_priority(priority)?;

    // `.value` wrappers carry a scalar alongside a priority.
    let json = match json {
        Value::Object(map) => match map.get(".value") {
            Some(v) if !v.is_null() => v,
            _ => json,
        },
        _ => json,
    };

    match json {
        Value::Bool(b) => Ok(Node::leaf_with_priority(Scalar::Bool(*b), priority_node)),
        Value::Number(n) => {
            let value = n
                .as_f64()
                .ok_or_else(|| TreeError::InvalidNode(format!("unrepresentable number {n}")))?;
            Ok(Node::leaf_with_priority(Scalar::Number(value), priority_node))
        }
        Value::String(s) => Ok(Node::leaf_with_priority(
            Scalar::String(s.clone()),
            priority_node,
        )),
        Value::Array(items) => {
            let mut node = Node::empty();
            for (i, item) in items.iter().enumerate() {
                if item.is_null() {
                    continue;
                }
                let child = node_from_json(item)?;
                node = node.update_immediate_child(&i.to_string(), &child);
            }
            Ok(node.update_priority(&priority_node))
        }
        Value::Object(map) => {
            let mut node = Node::empty();
            for (key, value) in map {
                if key.starts_with('.') {
                    continue;
                }
                let child = node_from_json(value)?;
                node = node.update_immediate_child(key, &child);
            }
            Ok(node.update_priority(&priority_node))
        }
        Value::Null => unreachable!("handled above"),
    }
}

fn parse_priority(priority: &Value) -> Result<Node> {
    match priority {
        Value::Null => Ok(Node::empty()),
        Value::Number(n) => {
            let value = n
                .as_f64()
                .ok_or_else(|| TreeError::InvalidPriority(format!("unrepresentable number {n}")))?;
            Ok(Node::leaf(Scalar::Number(value)))
        }
        Value::String(s) => Ok(Node::leaf(Scalar::String(s.clone()))),
        other => Err(TreeError::InvalidPriority(format!(
            "priorities must be strings or numbers, got {other}"
        ))),
    }
}

fn number_to_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= 9007199254740992.0 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Number(n) => number_to_json(*n),
        Scalar::String(s) => Value::String(s.clone()),
    }
}

/// A key counts toward array shape only as a canonical non-negative
/// decimal (no sign, no leading zeros).
fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

impl Node {
    /// Plain JSON value of this subtree. Densely integer-keyed interiors
    /// come back as arrays; priorities are dropped.
    pub fn val(&self) -> Value {
        self.to_json(false)
    }

    /// Export JSON: like [`val`](Node::val) but with `.priority`
    /// annotations (and `.value` wrappers for annotated leaves), and no
    /// array conversion.
    pub fn val_export(&self) -> Value {
        self.to_json(true)
    }

    fn to_json(&self, export: bool) -> Value {
        match &*self.repr {
            Repr::Empty => Value::Null,
            Repr::Max => unreachable!("the max sentinel has no JSON form"),
            Repr::Leaf {
                value, priority, ..
            } => {
                if export && !priority.is_empty() {
                    let mut map = Map::new();
                    map.insert(".value".to_string(), scalar_to_json(value));
                    map.insert(".priority".to_string(), priority.val());
                    Value::Object(map)
                } else {
                    scalar_to_json(value)
                }
            }
            Repr::Children { priority, .. } => {
                let mut map = Map::new();
                let mut num_keys = 0usize;
                let mut max_key = 0usize;
                let mut all_integer_keys = true;
                self.for_each_child(&Index::Priority, &mut |name, child| {
                    map.insert(name.to_string(), child.to_json(export));
                    num_keys += 1;
                    match array_index(name) {
                        Some(i) if all_integer_keys => max_key = max_key.max(i),
                        _ => all_integer_keys = false,
                    }
                    false
                });
                if !export && all_integer_keys && max_key < 2 * num_keys {
                    // Dense enough to round-trip as an array; holes
                    // become nulls.
                    let mut array = vec![Value::Null; max_key + 1];
                    for (key, value) in map {
                        let i = array_index(&key).unwrap();
                        array[i] = value;
                    }
                    Value::Array(array)
                } else {
                    if export && !priority.is_empty() {
                        map.insert(".priority".to_string(), priority.val());
                    }
                    Value::Object(map)
                }
            }
        }
    }
}
