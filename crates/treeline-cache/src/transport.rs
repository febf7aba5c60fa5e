//! Server transport contract and the wire extension records that carry
//! entity annotations alongside query results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::GLOBAL_ID_KEY;
use crate::error::Result;

/// One step into the response data: an object key or a list index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> PathSegment {
        PathSegment::Key(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> PathSegment {
        PathSegment::Index(i)
    }
}

/// Server-side annotation attached to a response: the node at `path`
/// is an entity (or a list of entities), and/or a cache lifetime hint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRecord {
    #[serde(default)]
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_ids: Option<Vec<String>>,
    /// Duration string like `"120s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Value,
    #[serde(default)]
    pub errors: Vec<Value>,
    #[serde(default)]
    pub extensions: Vec<ExtensionRecord>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke_query(&self, name: &str, variables: &Value) -> Result<QueryResponse>;

    async fn invoke_mutation(&self, name: &str, variables: &Value) -> Result<QueryResponse>;
}

/// Auth token supplier consulted before requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, force_refresh: bool) -> Result<Option<String>>;

    fn add_token_change_listener(&self, listener: Box<dyn Fn(Option<&str>) + Send + Sync>);
}

/// Extracts a `maxAge` hint in whole seconds, if any extension carries
/// one.
pub fn max_age_from_extensions(extensions: &[ExtensionRecord]) -> Option<u64> {
    for extension in extensions {
        if let Some(max_age) = &extension.max_age {
            let digits = max_age.strip_suffix('s').unwrap_or(max_age);
            if let Ok(seconds) = digits.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// Builds the entity annotation tree from extension records.
///
/// The tree mirrors the shape of the response data; each annotated node
/// is an object holding the entity's global id under [`GLOBAL_ID_KEY`],
/// with nested annotations below it. `entity_ids` annotates the
/// elements of the list at `path` positionally.
pub fn parse_entity_ids(extensions: &[ExtensionRecord]) -> Option<Value> {
    let mut tree = Value::Null;
    let mut any = false;
    for extension in extensions {
        if let Some(entity_id) = &extension.entity_id {
            let node = node_at_path_mut(&mut tree, &extension.path);
            annotate(node, entity_id);
            any = true;
        }
        if let Some(entity_ids) = &extension.entity_ids {
            let list = node_at_path_mut(&mut tree, &extension.path);
            if !list.is_array() {
                *list = Value::Array(Vec::new());
            }
            let items = list.as_array_mut().unwrap();
            for (i, entity_id) in entity_ids.iter().enumerate() {
                if items.len() <= i {
                    items.resize(i + 1, Value::Null);
                }
                annotate(&mut items[i], entity_id);
            }
            any = true;
        }
    }
    if any {
        Some(tree)
    } else {
        None
    }
}

fn annotate(node: &mut Value, entity_id: &str) {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut().unwrap().insert(
        GLOBAL_ID_KEY.to_string(),
        Value::String(entity_id.to_string()),
    );
}

fn node_at_path_mut<'a>(tree: &'a mut Value, path: &[PathSegment]) -> &'a mut Value {
    let mut node = tree;
    for segment in path {
        node = match segment {
            PathSegment::Key(key) => {
                if !node.is_object() {
                    *node = Value::Object(Map::new());
                }
                node.as_object_mut()
                    .unwrap()
                    .entry(key.clone())
                    .or_insert(Value::Null)
            }
            PathSegment::Index(i) => {
                if !node.is_array() {
                    *node = Value::Array(Vec::new());
                }
                let items = node.as_array_mut().unwrap();
                if items.len() <= *i {
                    items.resize(i + 1, Value::Null);
                }
                &mut items[*i]
            }
        };
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_annotation_trees_from_paths() {
        let extensions = vec![
            ExtensionRecord {
                path: vec!["movies".into(), 0usize.into()],
                entity_id: Some("matrix".to_string()),
                ..Default::default()
            },
            ExtensionRecord {
                path: vec!["movies".into()],
                entity_ids: Some(vec!["a".to_string(), "b".to_string()]),
                ..Default::default()
            },
        ];
        let tree = parse_entity_ids(&extensions).unwrap();
        assert_eq!(tree["movies"][0][GLOBAL_ID_KEY], json!("a"));
        assert_eq!(tree["movies"][1][GLOBAL_ID_KEY], json!("b"));
    }

    #[test]
    fn ignores_extensions_without_entity_annotations() {
        let extensions = vec![ExtensionRecord {
            max_age: Some("60s".to_string()),
            ..Default::default()
        }];
        assert!(parse_entity_ids(&extensions).is_none());
        assert_eq!(max_age_from_extensions(&extensions), Some(60));
    }

    #[test]
    fn max_age_accepts_bare_seconds() {
        let extensions = vec![ExtensionRecord {
            max_age: Some("45".to_string()),
            ..Default::default()
        }];
        assert_eq!(max_age_from_extensions(&extensions), Some(45));
    }
}
