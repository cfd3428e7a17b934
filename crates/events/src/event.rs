use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::command::{
    CreateCategory, CreateProduct, CreateProductPrice, DeleteProduct, DeleteProductPrice,
    UpdateCategory, UpdateProduct,
};
use crate::envelope::EnvelopeError;
use crate::topic::Topic;

/// Every event body the catalog exchanges, discriminated by topic.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEvent {
    CategoryCreated(CreateCategory),
    CategoryUpdated(UpdateCategory),
    ProductCreated(CreateProduct),
    ProductUpdated(UpdateProduct),
    ProductDeleted(DeleteProduct),
    ProductPriceCreated(CreateProductPrice),
    ProductPriceDeleted(DeleteProductPrice),
}

impl CatalogEvent {
    /// Decode a raw body using the topic it arrived on.
    ///
    /// Bodies without an `id` are rejected: there is nothing to apply them to.
    pub fn decode(topic: Topic, body: JsonValue) -> Result<Self, EnvelopeError> {
        let event = match topic {
            Topic::CategoryCreated => Self::CategoryCreated(body_as(topic, body)?),
            Topic::CategoryUpdated => Self::CategoryUpdated(body_as(topic, body)?),
            Topic::ProductCreated => Self::ProductCreated(body_as(topic, body)?),
            Topic::ProductUpdated => Self::ProductUpdated(body_as(topic, body)?),
            Topic::ProductDeleted => Self::ProductDeleted(body_as(topic, body)?),
            Topic::ProductPriceCreated => Self::ProductPriceCreated(body_as(topic, body)?),
            Topic::ProductPriceDeleted => Self::ProductPriceDeleted(body_as(topic, body)?),
        };

        if event.id().trim().is_empty() {
            return Err(EnvelopeError::Body {
                topic: topic.to_string(),
                reason: "missing id".to_string(),
            });
        }
        Ok(event)
    }

    pub fn topic(&self) -> Topic {
        match self {
            Self::CategoryCreated(_) => Topic::CategoryCreated,
            Self::CategoryUpdated(_) => Topic::CategoryUpdated,
            Self::ProductCreated(_) => Topic::ProductCreated,
            Self::ProductUpdated(_) => Topic::ProductUpdated,
            Self::ProductDeleted(_) => Topic::ProductDeleted,
            Self::ProductPriceCreated(_) => Topic::ProductPriceCreated,
            Self::ProductPriceDeleted(_) => Topic::ProductPriceDeleted,
        }
    }

    /// Id of the record this event targets.
    pub fn id(&self) -> &str {
        match self {
            Self::CategoryCreated(b) => &b.id,
            Self::CategoryUpdated(b) => &b.id,
            Self::ProductCreated(b) => &b.id,
            Self::ProductUpdated(b) => &b.id,
            Self::ProductDeleted(b) => &b.id,
            Self::ProductPriceCreated(b) => &b.id,
            Self::ProductPriceDeleted(b) => &b.id,
        }
    }

    /// Serialize the body (without envelope) for publishing.
    pub fn to_body(&self) -> Result<JsonValue, EnvelopeError> {
        let value = match self {
            Self::CategoryCreated(b) => serde_json::to_value(b),
            Self::CategoryUpdated(b) => serde_json::to_value(b),
            Self::ProductCreated(b) => serde_json::to_value(b),
            Self::ProductUpdated(b) => serde_json::to_value(b),
            Self::ProductDeleted(b) => serde_json::to_value(b),
            Self::ProductPriceCreated(b) => serde_json::to_value(b),
            Self::ProductPriceDeleted(b) => serde_json::to_value(b),
        };
        value.map_err(|e| EnvelopeError::Encode(e.to_string()))
    }
}

fn body_as<T: DeserializeOwned>(topic: Topic, body: JsonValue) -> Result<T, EnvelopeError> {
    serde_json::from_value(body).map_err(|e| EnvelopeError::Body {
        topic: topic.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_selects_body_shape() {
        let body = json!({"id": "p1", "delete_date": "2024-05-01T00:00:00Z"});

        let event = CatalogEvent::decode(Topic::ProductPriceDeleted, body.clone()).unwrap();
        assert_eq!(event.topic(), Topic::ProductPriceDeleted);
        match event {
            CatalogEvent::ProductPriceDeleted(b) => {
                assert_eq!(b.id, "p1");
                assert!(b.delete_date.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }

        let event = CatalogEvent::decode(Topic::ProductDeleted, body).unwrap();
        assert!(matches!(event, CatalogEvent::ProductDeleted(_)));
    }

    #[test]
    fn product_create_reads_reference_lists() {
        let body = json!({
            "id": "x1",
            "title": "Mug",
            "status": "active",
            "productPrice": [{"id": "p1", "name": "retail"}, {"id": "p2"}],
            "category": [{"id": "c1", "@type": "category"}],
            "lastUpdate": "0001-01-01T00:00:00Z",
        });

        let CatalogEvent::ProductCreated(b) = CatalogEvent::decode(Topic::ProductCreated, body).unwrap()
        else {
            panic!("expected product.created");
        };
        assert_eq!(b.product_price.len(), 2);
        assert_eq!(b.product_price[0].name.as_deref(), Some("retail"));
        assert_eq!(b.category[0].id, "c1");
        assert!(b.last_update.is_none());
    }

    #[test]
    fn wrong_shape_is_a_body_error() {
        let err = CatalogEvent::decode(Topic::CategoryCreated, json!({"id": 42})).unwrap_err();
        assert!(matches!(err, EnvelopeError::Body { ref topic, .. } if topic == "category.created"));

        let err = CatalogEvent::decode(Topic::CategoryCreated, json!("nope")).unwrap_err();
        assert!(matches!(err, EnvelopeError::Body { .. }));
    }

    #[test]
    fn missing_id_is_rejected() {
        let err = CatalogEvent::decode(Topic::ProductUpdated, json!({"id": "", "title": "x"})).unwrap_err();
        assert!(matches!(err, EnvelopeError::Body { ref reason, .. } if reason == "missing id"));
        assert!(CatalogEvent::decode(Topic::ProductUpdated, json!({"title": "x"})).is_err());
    }

    #[test]
    fn to_body_matches_decode() {
        let event = CatalogEvent::ProductUpdated(UpdateProduct {
            id: "x1".into(),
            title: "New".into(),
            ..Default::default()
        });
        let body = event.to_body().unwrap();
        assert_eq!(body["id"], "x1");
        assert_eq!(CatalogEvent::decode(Topic::ProductUpdated, body).unwrap(), event);
    }
}
