//! Entity-normalized representation of a query response.
//!
//! A response tree is decomposed into [`EntityNode`]s. Fields of nodes
//! the server annotated as entities are pulled out into a shared
//! [`EntityData`] record keyed by the entity's global id, so that every
//! query holding a reference to that entity observes the latest server
//! values when its result is rehydrated.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::accumulator::ImpactedQueryRefs;
use crate::error::{CacheError, Result};
use crate::provider::CacheProvider;

/// Key under which the annotation tree carries an entity's global id.
pub const GLOBAL_ID_KEY: &str = "_id";

/// The shared, last-write-wins record for one entity, plus the set of
/// query ids whose cached results depend on it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntityData {
    pub global_id: String,
    pub server_values: Map<String, Value>,
    pub queries: BTreeSet<String>,
}

impl EntityData {
    pub fn new(global_id: impl Into<String>) -> EntityData {
        EntityData {
            global_id: global_id.into(),
            server_values: Map::new(),
            queries: BTreeSet::new(),
        }
    }
}

/// How [`EntityNode::to_json`] renders entity-backed fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingMode {
    /// Structure only; entity fields stay behind their global id.
    Dehydrated,
    /// Entity fields are filled in from the provider.
    Hydrated,
}

/// One node of a cached result tree.
///
/// Scalar fields of an entity-annotated node live in the shared
/// [`EntityData`]; `entity_data_keys` remembers which of them this
/// query actually selected. Everything else is stored inline.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntityNode {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub scalars: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scalar_lists: BTreeMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, EntityNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub object_lists: BTreeMap<String, Vec<EntityNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_ref: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub entity_data_keys: BTreeSet<String>,
}

impl EntityNode {
    pub fn new() -> EntityNode {
        EntityNode::default()
    }

    /// Decomposes `data` into this node, routing annotated fields into
    /// shared [`EntityData`] records through the provider.
    ///
    /// `annotations` is the tree built by
    /// [`parse_entity_ids`](crate::transport::parse_entity_ids); it
    /// mirrors the shape of `data` and marks which nodes are entities.
    /// Queries already referencing a touched entity are recorded in
    /// `accumulator`.
    pub fn load_data<'a>(
        &'a mut self,
        query_id: &'a str,
        data: &'a Value,
        annotations: Option<&'a Value>,
        accumulator: &'a mut ImpactedQueryRefs,
        provider: &'a dyn CacheProvider,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let fields = data.as_object().ok_or_else(|| {
                CacheError::invalid_argument("result data must be a JSON object")
            })?;
            let annotation_map = annotations.and_then(Value::as_object);

            let mut entity = match annotation_map
                .and_then(|m| m.get(GLOBAL_ID_KEY))
                .and_then(Value::as_str)
            {
                Some(global_id) => {
                    let mut entity = provider
                        .get_entity(global_id)
                        .await?
                        .unwrap_or_else(|| EntityData::new(global_id));
                    for existing in &entity.queries {
                        accumulator.record(existing);
                    }
                    entity.queries.insert(query_id.to_string());
                    self.entity_ref = Some(global_id.to_string());
                    Some(entity)
                }
                None => None,
            };

            for (key, value) in fields {
                let field_annotation = annotation_map.and_then(|m| m.get(key.as_str()));
                match value {
                    Value::Object(_) => {
                        let mut child = EntityNode::new();
                        child
                            .load_data(query_id, value, field_annotation, accumulator, provider)
                            .await?;
                        self.references.insert(key.clone(), child);
                    }
                    Value::Array(items) => {
                        self.load_list(
                            query_id,
                            key,
                            items,
                            field_annotation,
                            accumulator,
                            provider,
                        )
                        .await?;
                    }
                    scalar => match &mut entity {
                        Some(entity) => {
                            entity.server_values.insert(key.clone(), scalar.clone());
                            self.entity_data_keys.insert(key.clone());
                        }
                        None => {
                            self.scalars.insert(key.clone(), scalar.clone());
                        }
                    },
                }
            }

            if let Some(entity) = entity {
                provider.put_entity(entity).await?;
            }
            Ok(())
        })
    }

    async fn load_list(
        &mut self,
        query_id: &str,
        key: &str,
        items: &[Value],
        field_annotation: Option<&Value>,
        accumulator: &mut ImpactedQueryRefs,
        provider: &dyn CacheProvider,
    ) -> Result<()> {
        let objects = items.iter().filter(|v| v.is_object()).count();
        if objects == 0 && items.iter().any(Value::is_array) {
            return Err(CacheError::invalid_argument(format!(
                "list field `{key}` may not contain nested lists"
            )));
        }
        if objects == 0 && !items.is_empty() {
            self.scalar_lists.insert(key.to_string(), items.to_vec());
            return Ok(());
        }
        if objects != items.len() && !items.is_empty() {
            return Err(CacheError::invalid_argument(format!(
                "list field `{key}` may not mix objects and scalars"
            )));
        }
        // An empty list is ambiguous on its own; an annotation for the
        // field tells us it was a list of entities.
        if items.is_empty() && field_annotation.is_none() {
            self.scalar_lists.insert(key.to_string(), Vec::new());
            return Ok(());
        }
        let mut children = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let item_annotation = field_annotation.and_then(|a| a.get(i));
            let mut child = EntityNode::new();
            child
                .load_data(query_id, item, item_annotation, accumulator, provider)
                .await?;
            children.push(child);
        }
        self.object_lists.insert(key.to_string(), children);
        Ok(())
    }

    /// Renders the node back into plain JSON. In hydrated mode the
    /// fields of entity-backed nodes are fetched from the provider, so
    /// the output reflects the freshest server values any query has
    /// seen for those entities.
    pub fn to_json<'a>(
        &'a self,
        mode: EncodingMode,
        provider: &'a dyn CacheProvider,
    ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
        Box::pin(async move {
            if mode == EncodingMode::Dehydrated {
                return Ok(serde_json::to_value(self)?);
            }
            let mut out = Map::new();
            if let Some(global_id) = &self.entity_ref {
                let entity = provider.get_entity(global_id).await?.ok_or_else(|| {
                    CacheError::not_found(format!("no entity data for `{global_id}`"))
                })?;
                for key in &self.entity_data_keys {
                    let value = entity.server_values.get(key).cloned().unwrap_or(Value::Null);
                    out.insert(key.clone(), value);
                }
            }
            for (key, value) in &self.scalars {
                out.insert(key.clone(), value.clone());
            }
            for (key, items) in &self.scalar_lists {
                out.insert(key.clone(), Value::Array(items.clone()));
            }
            for (key, child) in &self.references {
                out.insert(key.clone(), child.to_json(mode, provider).await?);
            }
            for (key, children) in &self.object_lists {
                let mut items = Vec::with_capacity(children.len());
                for child in children {
                    items.push(child.to_json(mode, provider).await?);
                }
                out.insert(key.clone(), Value::Array(items));
            }
            Ok(Value::Object(out))
        })
    }
}
