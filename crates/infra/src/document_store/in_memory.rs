use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{
    compare_values, document_id, field_path, DocumentStore, Filter, FindOptions, JsonMap,
    SortDirection, StoreError, DELETE_DATE,
};

/// In-memory document store for tests/dev.
///
/// Collections keep insertion order, which is the "store order" used when a
/// find has no sort.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<JsonValue>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every document of a collection, deleted ones included.
    pub fn dump(&self, collection: &str) -> Vec<JsonValue> {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(collection).cloned())
            .unwrap_or_default()
    }
}

fn compile(filter: &Filter) -> Result<Option<regex::Regex>, StoreError> {
    filter.text.as_ref().map(|t| t.regex()).transpose()
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<(Vec<JsonValue>, u64), StoreError> {
        let re = compile(filter)?;
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;

        let mut hits: Vec<&JsonValue> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d, re.as_ref())).collect())
            .unwrap_or_default();
        let total = hits.len() as u64;

        if let Some(sort) = &options.sort {
            // Stable: ties keep insertion order.
            hits.sort_by(|a, b| {
                let ord = compare_values(field_path(a, sort.field), field_path(b, sort.field));
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        let page = hits.into_iter().skip(skip).take(limit).cloned().collect();

        Ok((page, total))
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<JsonValue, StoreError> {
        let re = compile(filter)?;
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;

        collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d, re.as_ref())))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert(&self, collection: &str, document: JsonValue) -> Result<String, StoreError> {
        let id = document_id(&document)?;
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let docs = collections.entry(collection.to_string()).or_default();

        if docs.iter().any(|d| d.get("id").and_then(JsonValue::as_str) == Some(id.as_str())) {
            return Err(StoreError::Conflict(id));
        }
        docs.push(document);
        Ok(id)
    }

    async fn upsert(&self, collection: &str, mut document: JsonValue) -> Result<String, StoreError> {
        let id = document_id(&document)?;
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let docs = collections.entry(collection.to_string()).or_default();

        match docs
            .iter_mut()
            .find(|d| d.get("id").and_then(JsonValue::as_str) == Some(id.as_str()))
        {
            Some(existing) => {
                let kept = existing.get(DELETE_DATE).cloned().unwrap_or(JsonValue::Null);
                if let Some(obj) = document.as_object_mut() {
                    obj.insert(DELETE_DATE.to_string(), kept);
                }
                *existing = document;
            }
            None => docs.push(document),
        }
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        merge: JsonMap,
    ) -> Result<JsonValue, StoreError> {
        if filter.id.is_none() {
            return Err(StoreError::InvalidFilter("update_one requires an id".to_string()));
        }
        let re = compile(filter)?;
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;

        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d, re.as_ref())))
            .ok_or(StoreError::NotFound)?;

        let obj = doc
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidDocument("stored document is not an object".to_string()))?;
        obj.extend(merge);
        Ok(doc.clone())
    }
}
