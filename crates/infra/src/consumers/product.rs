use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use catalog_auth::TokenValidator;
use catalog_core::{EntityKind, Product};
use catalog_events::{CatalogEvent, DeleteProductPrice, Envelope, EventProducer, Header, Topic};

use crate::consumers::apply::{
    apply_create, apply_delete, apply_update, new_price, new_product, product_changes,
};
use crate::consumers::{loggable_header, ApplyError, ApplyOutcome, MessageHandler};
use crate::document_store::DocumentStore;

pub const PRODUCT_GROUP: &str = "product_consumer_group";

const TOPICS: [Topic; 5] = [
    Topic::ProductCreated,
    Topic::ProductUpdated,
    Topic::ProductDeleted,
    Topic::ProductPriceCreated,
    Topic::ProductPriceDeleted,
];

/// Consumer group for product and product price topics.
///
/// Every message must carry a valid bearer token in its `Authorization`
/// header; anything else is rejected before the body is even decoded.
/// Deleting a product cascades a `productPrice.deleted` for each price it
/// references, carrying the original header.
pub struct ProductConsumer {
    store: Arc<dyn DocumentStore>,
    producer: EventProducer,
    validator: Arc<dyn TokenValidator>,
    group_id: String,
}

impl ProductConsumer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        producer: EventProducer,
        validator: Arc<dyn TokenValidator>,
    ) -> Self {
        Self {
            store,
            producer,
            validator,
            group_id: PRODUCT_GROUP.to_string(),
        }
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    async fn process(&self, topic: Topic, payload: &[u8]) -> Result<(), ApplyError> {
        if !TOPICS.contains(&topic) {
            return Err(ApplyError::UnexpectedTopic(topic));
        }
        let envelope = Envelope::decode(payload)?;
        self.validator.validate_header(envelope.authorization())?;

        let (header, body) = envelope.into_parts();
        let event = CatalogEvent::decode(topic, body)?;
        let id = event.id().to_string();

        match event {
            CatalogEvent::ProductCreated(body) => {
                apply_create(&*self.store, &new_product(body)).await?;
            }
            CatalogEvent::ProductUpdated(body) => {
                let changes = product_changes(&body)?;
                apply_update(&*self.store, EntityKind::Product, &body.id, changes, body.last_update).await?;
            }
            CatalogEvent::ProductDeleted(body) => {
                let delete_date = body.delete_date.unwrap_or_else(Utc::now);
                let doc = apply_delete(&*self.store, EntityKind::Product, &body.id, Some(delete_date)).await?;
                let product: Product = serde_json::from_value(doc).map_err(|e| {
                    ApplyError::Store(crate::document_store::StoreError::InvalidDocument(e.to_string()))
                })?;
                self.cascade_price_deletes(&header, &product, delete_date).await?;
            }
            CatalogEvent::ProductPriceCreated(body) => {
                apply_create(&*self.store, &new_price(body)).await?;
            }
            CatalogEvent::ProductPriceDeleted(body) => {
                apply_delete(&*self.store, EntityKind::ProductPrice, &body.id, body.delete_date).await?;
            }
            other => return Err(ApplyError::UnexpectedTopic(other.topic())),
        }

        info!(topic = %topic, id = %id, header = ?loggable_header(&header), "product message applied");
        Ok(())
    }

    /// Publish one `productPrice.deleted` per referenced price. Every price is
    /// attempted; the first failure is reported afterwards.
    async fn cascade_price_deletes(
        &self,
        header: &Header,
        product: &Product,
        delete_date: DateTime<Utc>,
    ) -> Result<(), ApplyError> {
        let mut first_err = None;

        for price in &product.product_price {
            let event = CatalogEvent::ProductPriceDeleted(DeleteProductPrice {
                id: price.id.clone(),
                delete_date: Some(delete_date),
            });
            match self.producer.publish_event(header.clone(), &event).await {
                Ok(_) => info!(product = %product.id, price = %price.id, "cascaded price delete"),
                Err(e) => {
                    error!(product = %product.id, price = %price.id, error = %e, "cascade publish failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MessageHandler for ProductConsumer {
    fn group_id(&self) -> &str {
        &self.group_id
    }

    fn topics(&self) -> &[Topic] {
        &TOPICS
    }

    async fn handle(&self, topic: Topic, payload: &[u8]) -> ApplyOutcome {
        let result = self.process(topic, payload).await;
        match &result {
            Ok(()) => {}
            Err(e @ (ApplyError::Decode(_) | ApplyError::UnexpectedTopic(_))) => {
                warn!(topic = %topic, error = %e, "dropping undecodable product message");
            }
            Err(e @ ApplyError::Unauthorized(_)) => {
                warn!(topic = %topic, error = %e, "rejecting unauthorized product message");
            }
            Err(e) => error!(topic = %topic, error = %e, "product apply failed"),
        }
        ApplyOutcome::from_result(result)
    }
}
