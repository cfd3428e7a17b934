//! Create / update / delete primitives shared by the consumers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use catalog_core::{Category, EntityKind, Product, ProductPrice, Record, Reference, normalize_refs};
use catalog_events::{CreateCategory, CreateProduct, CreateProductPrice, UpdateCategory, UpdateProduct};

use crate::consumers::ApplyError;
use crate::document_store::{DocumentStore, Filter, JsonMap, StoreError, DELETE_DATE};

/// Upsert a freshly built record by id.
pub async fn apply_create<R: Record>(store: &dyn DocumentStore, record: &R) -> Result<(), ApplyError> {
    let document = to_document(record)?;
    store.upsert(R::KIND.collection(), document).await?;
    Ok(())
}

/// Merge `changes` into the active record `id`, refreshing `lastUpdate`.
pub async fn apply_update(
    store: &dyn DocumentStore,
    kind: EntityKind,
    id: &str,
    mut changes: JsonMap,
    last_update: Option<DateTime<Utc>>,
) -> Result<JsonValue, ApplyError> {
    changes.insert(
        "lastUpdate".to_string(),
        timestamp(last_update.unwrap_or_else(Utc::now)),
    );

    store
        .update_one(kind.collection(), &Filter::active_by_id(id), changes)
        .await
        .map_err(|e| not_found_as(e, kind, id))
}

/// Set `deleteDate` on record `id`, whatever its current state.
pub async fn apply_delete(
    store: &dyn DocumentStore,
    kind: EntityKind,
    id: &str,
    delete_date: Option<DateTime<Utc>>,
) -> Result<JsonValue, ApplyError> {
    let mut changes = JsonMap::new();
    changes.insert(
        DELETE_DATE.to_string(),
        timestamp(delete_date.unwrap_or_else(Utc::now)),
    );

    store
        .update_one(kind.collection(), &Filter::by_id(id), changes)
        .await
        .map_err(|e| not_found_as(e, kind, id))
}

fn not_found_as(err: StoreError, kind: EntityKind, id: &str) -> ApplyError {
    match err {
        StoreError::NotFound => ApplyError::NotFound {
            kind,
            id: id.to_string(),
        },
        other => ApplyError::Store(other),
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<JsonValue, ApplyError> {
    serde_json::to_value(value).map_err(|e| ApplyError::Store(StoreError::InvalidDocument(e.to_string())))
}

fn timestamp(at: DateTime<Utc>) -> JsonValue {
    JsonValue::String(at.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
}

fn put_str(changes: &mut JsonMap, field: &str, value: &str) {
    if !value.is_empty() {
        changes.insert(field.to_string(), JsonValue::String(value.to_string()));
    }
}

fn put_refs(changes: &mut JsonMap, field: &str, refs: &[Reference], kind: EntityKind) -> Result<(), ApplyError> {
    let refs = normalize_refs(refs.to_vec(), kind);
    if !refs.is_empty() {
        changes.insert(field.to_string(), to_document(&refs)?);
    }
    Ok(())
}

pub fn new_category(body: CreateCategory) -> Category {
    Category {
        id: body.id,
        kind: EntityKind::Category.type_name().to_string(),
        name: body.name,
        status: body.status,
        products: normalize_refs(body.products, EntityKind::Product),
        last_update: Some(body.last_update.unwrap_or_else(Utc::now)),
        delete_date: None,
    }
}

pub fn new_product(body: CreateProduct) -> Product {
    Product {
        id: body.id,
        kind: EntityKind::Product.type_name().to_string(),
        status: body.status,
        title: body.title,
        description: body.description,
        image: body.image,
        category: normalize_refs(body.category, EntityKind::Category),
        product_price: normalize_refs(body.product_price, EntityKind::ProductPrice),
        last_update: Some(body.last_update.unwrap_or_else(Utc::now)),
        delete_date: None,
    }
}

pub fn new_price(body: CreateProductPrice) -> ProductPrice {
    ProductPrice {
        id: body.id,
        kind: EntityKind::ProductPrice.type_name().to_string(),
        status: body.status,
        name: body.name,
        price: body.price,
        last_update: Some(body.last_update.unwrap_or_else(Utc::now)),
        delete_date: None,
    }
}

/// Non-empty fields of a category update.
pub fn category_changes(body: &UpdateCategory) -> Result<JsonMap, ApplyError> {
    let mut changes = JsonMap::new();
    put_str(&mut changes, "name", &body.name);
    put_str(&mut changes, "status", &body.status);
    put_refs(&mut changes, "products", &body.products, EntityKind::Product)?;
    Ok(changes)
}

/// Non-empty fields of a product update.
pub fn product_changes(body: &UpdateProduct) -> Result<JsonMap, ApplyError> {
    let mut changes = JsonMap::new();
    put_str(&mut changes, "status", &body.status);
    put_str(&mut changes, "title", &body.title);
    put_str(&mut changes, "description", &body.description);
    put_str(&mut changes, "image", &body.image);
    put_refs(&mut changes, "category", &body.category, EntityKind::Category)?;
    put_refs(&mut changes, "productPrice", &body.product_price, EntityKind::ProductPrice)?;
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::InMemoryDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn create_sets_type_and_last_update_defaults() {
        let store = InMemoryDocumentStore::new();
        let record = new_price(CreateProductPrice {
            id: "p1".into(),
            name: "retail".into(),
            ..Default::default()
        });
        apply_create(&store, &record).await.unwrap();

        let doc = store.find_one("productPrice", &Filter::active_by_id("p1")).await.unwrap();
        assert_eq!(doc["@type"], "productPrice");
        assert!(doc["lastUpdate"].is_string());
        assert!(doc["deleteDate"].is_null());
    }

    #[test]
    fn update_changes_skip_empty_fields() {
        let body = UpdateProduct {
            id: "x1".into(),
            title: "New".into(),
            product_price: vec![Reference { id: "p9".into(), kind: String::new(), name: None }],
            ..Default::default()
        };
        let changes = product_changes(&body).unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes["title"], "New");
        assert_eq!(changes["productPrice"], json!([{"id": "p9", "@type": "productPrice"}]));
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = apply_update(&store, EntityKind::Category, "c404", JsonMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::NotFound { kind: EntityKind::Category, ref id } if id == "c404"));
    }

    #[tokio::test]
    async fn delete_uses_supplied_timestamp() {
        let store = InMemoryDocumentStore::new();
        apply_create(&store, &new_category(CreateCategory { id: "c1".into(), ..Default::default() }))
            .await
            .unwrap();

        let at = "2024-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let doc = apply_delete(&store, EntityKind::Category, "c1", Some(at)).await.unwrap();
        assert_eq!(doc["deleteDate"], "2024-06-01T12:00:00Z");

        // Deleting again is fine and keeps the record soft-deleted.
        apply_delete(&store, EntityKind::Category, "c1", Some(at)).await.unwrap();
        assert!(store.find_one("category", &Filter::active_by_id("c1")).await.is_err());
    }
}
