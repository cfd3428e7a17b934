//! Document store boundary.
//!
//! Records are stored as JSON documents in named collections and addressed by
//! their `id` field. The apply engine is the only writer; the HTTP read path
//! only calls `find`/`find_one`.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

/// Field holding the soft-delete timestamp.
pub const DELETE_DATE: &str = "deleteDate";

pub type JsonMap = Map<String, JsonValue>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,

    #[error("document already exists: {0}")]
    Conflict(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Case-insensitive text match over a set of string fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    pub pattern: String,
    pub fields: Vec<&'static str>,
}

impl TextMatch {
    pub fn new(pattern: impl Into<String>, fields: &[&'static str]) -> Self {
        Self {
            pattern: pattern.into(),
            fields: fields.to_vec(),
        }
    }

    /// The pattern as a regular expression; patterns that do not compile are
    /// matched literally.
    pub fn effective_pattern(&self) -> String {
        match Regex::new(&self.pattern) {
            Ok(_) => self.pattern.clone(),
            Err(_) => regex::escape(&self.pattern),
        }
    }

    pub fn regex(&self) -> Result<Regex, StoreError> {
        RegexBuilder::new(&self.effective_pattern())
            .case_insensitive(true)
            .build()
            .map_err(|e| StoreError::InvalidFilter(e.to_string()))
    }
}

/// Document filter. All present criteria are AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub id: Option<String>,
    /// Exclude documents with a non-null `deleteDate`.
    pub active_only: bool,
    pub text: Option<TextMatch>,
}

impl Filter {
    /// `{id}` regardless of delete state.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// `{id, deleteDate: null}`.
    pub fn active_by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            active_only: true,
            text: None,
        }
    }

    /// `{deleteDate: null}`.
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: TextMatch) -> Self {
        self.text = Some(text);
        self
    }

    /// Evaluate the filter against a document (used by stores that filter in
    /// process). `text_re` must be the compiled form of `self.text`.
    pub fn matches(&self, doc: &JsonValue, text_re: Option<&Regex>) -> bool {
        if let Some(id) = &self.id {
            if doc.get("id").and_then(JsonValue::as_str) != Some(id.as_str()) {
                return false;
            }
        }
        if self.active_only && !is_active(doc) {
            return false;
        }
        if let (Some(text), Some(re)) = (&self.text, text_re) {
            let hit = text.fields.iter().any(|field| {
                doc.get(*field)
                    .and_then(JsonValue::as_str)
                    .is_some_and(|s| re.is_match(s))
            });
            if !hit {
                return false;
            }
        }
        true
    }
}

pub fn is_active(doc: &JsonValue) -> bool {
    doc.get(DELETE_DATE).is_none_or(JsonValue::is_null)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort on a dotted field path (e.g. `price.value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: &'static str,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// `None` keeps store (insertion) order.
    pub sort: Option<Sort>,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Look up a dotted path inside a document.
pub fn field_path<'a>(doc: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(doc, |cur, key| cur.get(key))
}

/// Ordering used for sorted finds: missing/null first, then booleans, numbers,
/// strings. Values of other shapes compare equal.
pub fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    fn rank(v: Option<&JsonValue>) -> u8 {
        match v {
            None | Some(JsonValue::Null) => 0,
            Some(JsonValue::Bool(_)) => 1,
            Some(JsonValue::Number(_)) => 2,
            Some(JsonValue::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Id of a document about to be written.
pub(crate) fn document_id(doc: &JsonValue) -> Result<String, StoreError> {
    if !doc.is_object() {
        return Err(StoreError::InvalidDocument("document must be a JSON object".to_string()));
    }
    match doc.get("id").and_then(JsonValue::as_str) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(StoreError::InvalidDocument("document has no id".to_string())),
    }
}

/// Collection-oriented document store.
///
/// Every single-document write is atomic; that atomicity is the only
/// serialization point between concurrent consumers touching the same id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Matching documents (after `skip`/`limit`) and the total match count
    /// before pagination.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<(Vec<JsonValue>, u64), StoreError>;

    /// First matching document, or `NotFound`.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<JsonValue, StoreError>;

    /// Insert a new document; `Conflict` if its id is taken.
    async fn insert(&self, collection: &str, document: JsonValue) -> Result<String, StoreError>;

    /// Insert or replace by id. A replaced document keeps its stored
    /// `deleteDate`, so upserts never reactivate a deleted record.
    async fn upsert(&self, collection: &str, document: JsonValue) -> Result<String, StoreError>;

    /// Shallow-merge `merge` into the document matching `filter` (which must
    /// name an id) and return the updated document, or `NotFound`.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        merge: JsonMap,
    ) -> Result<JsonValue, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<(Vec<JsonValue>, u64), StoreError> {
        (**self).find(collection, filter, options).await
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<JsonValue, StoreError> {
        (**self).find_one(collection, filter).await
    }

    async fn insert(&self, collection: &str, document: JsonValue) -> Result<String, StoreError> {
        (**self).insert(collection, document).await
    }

    async fn upsert(&self, collection: &str, document: JsonValue) -> Result<String, StoreError> {
        (**self).upsert(collection, document).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        merge: JsonMap,
    ) -> Result<JsonValue, StoreError> {
        (**self).update_one(collection, filter, merge).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_combines_id_activity_and_text() {
        let doc = json!({"id": "x1", "title": "Blue Mug", "description": "", "deleteDate": null});
        let text = TextMatch::new("mug", &["title", "description"]);
        let re = text.regex().unwrap();

        assert!(Filter::active_by_id("x1").matches(&doc, None));
        assert!(!Filter::by_id("x2").matches(&doc, None));
        assert!(Filter::active().with_text(text.clone()).matches(&doc, Some(&re)));

        let deleted = json!({"id": "x1", "title": "Blue Mug", "deleteDate": "2024-01-01T00:00:00Z"});
        assert!(!Filter::active_by_id("x1").matches(&deleted, None));
        assert!(Filter::by_id("x1").matches(&deleted, None));
    }

    #[test]
    fn invalid_regex_is_matched_literally() {
        let text = TextMatch::new("mug (", &["title"]);
        assert_eq!(text.effective_pattern(), r"mug \(");
        let re = text.regex().unwrap();
        assert!(re.is_match("Big MUG (red)"));
        assert!(!re.is_match("Big mug"));
    }

    #[test]
    fn nested_field_ordering_puts_missing_first() {
        let cheap = json!({"price": {"value": 3.5}});
        let pricey = json!({"price": {"value": 10}});
        let none = json!({});

        let get = |d: &JsonValue| field_path(d, "price.value").cloned();
        assert_eq!(compare_values(get(&cheap).as_ref(), get(&pricey).as_ref()), Ordering::Less);
        assert_eq!(compare_values(get(&none).as_ref(), get(&cheap).as_ref()), Ordering::Less);
    }

    #[test]
    fn documents_need_an_object_with_id() {
        assert_eq!(document_id(&json!({"id": "a"})).unwrap(), "a");
        assert!(document_id(&json!({"id": ""})).is_err());
        assert!(document_id(&json!([1])).is_err());
    }
}
