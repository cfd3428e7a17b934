use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use catalog_core::EntityKind;
use catalog_events::{CatalogEvent, Envelope, Topic};

use crate::consumers::apply::{apply_create, apply_update, category_changes, new_category};
use crate::consumers::{loggable_header, ApplyError, ApplyOutcome, MessageHandler};
use crate::document_store::DocumentStore;

pub const CATEGORY_GROUP: &str = "category-service";

const TOPICS: [Topic; 2] = [Topic::CategoryCreated, Topic::CategoryUpdated];

/// Consumer group for category topics.
///
/// Unlike [`ProductConsumer`](crate::consumers::ProductConsumer), this group
/// does not check the caller's token before applying.
pub struct CategoryConsumer {
    store: Arc<dyn DocumentStore>,
    group_id: String,
}

impl CategoryConsumer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            group_id: CATEGORY_GROUP.to_string(),
        }
    }

    /// Override the consumer group id (tests run several groups on one broker).
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    async fn process(&self, topic: Topic, payload: &[u8]) -> Result<(), ApplyError> {
        if !TOPICS.contains(&topic) {
            return Err(ApplyError::UnexpectedTopic(topic));
        }
        let (header, body) = Envelope::decode(payload)?.into_parts();
        let event = CatalogEvent::decode(topic, body)?;
        let id = event.id().to_string();

        match event {
            CatalogEvent::CategoryCreated(body) => {
                apply_create(&*self.store, &new_category(body)).await?;
            }
            CatalogEvent::CategoryUpdated(body) => {
                let changes = category_changes(&body)?;
                apply_update(&*self.store, EntityKind::Category, &body.id, changes, body.last_update).await?;
            }
            other => return Err(ApplyError::UnexpectedTopic(other.topic())),
        }

        info!(topic = %topic, id = %id, header = ?loggable_header(&header), "category applied");
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for CategoryConsumer {
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
                warn!(topic = %topic, error = %e, "dropping undecodable category message");
            }
            Err(e) => error!(topic = %topic, error = %e, "category apply failed"),
        }
        ApplyOutcome::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::{Filter, InMemoryDocumentStore};
    use serde_json::json;

    fn envelope(body: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({"header": {"request_id": "r1"}, "body": body})).unwrap()
    }

    #[tokio::test]
    async fn create_then_update_merges_non_empty_fields() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let consumer = CategoryConsumer::new(store.clone());

        let out = consumer
            .handle(
                Topic::CategoryCreated,
                &envelope(json!({"id": "c1", "name": "Kitchen", "status": "active"})),
            )
            .await;
        assert_eq!(out, ApplyOutcome::Applied);

        let out = consumer
            .handle(
                Topic::CategoryUpdated,
                &envelope(json!({"id": "c1", "name": "", "status": "inActive", "products": [{"id": "x1"}]})),
            )
            .await;
        assert_eq!(out, ApplyOutcome::Applied);

        let doc = store.find_one("category", &Filter::active_by_id("c1")).await.unwrap();
        assert_eq!(doc["name"], "Kitchen");
        assert_eq!(doc["status"], "inActive");
        assert_eq!(doc["@type"], "category");
        assert_eq!(doc["products"], json!([{"id": "x1", "@type": "products"}]));
    }

    #[tokio::test]
    async fn replayed_create_keeps_one_record() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let consumer = CategoryConsumer::new(store.clone());
        let msg = envelope(json!({"id": "c1", "name": "Kitchen"}));

        consumer.handle(Topic::CategoryCreated, &msg).await;
        consumer.handle(Topic::CategoryCreated, &msg).await;

        assert_eq!(store.dump("category").len(), 1);
    }

    #[tokio::test]
    async fn update_for_unknown_id_fails_without_creating() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let consumer = CategoryConsumer::new(store.clone());

        let out = consumer
            .handle(Topic::CategoryUpdated, &envelope(json!({"id": "ghost", "name": "x"})))
            .await;
        assert!(matches!(out, ApplyOutcome::Failed(_)));
        assert!(store.dump("category").is_empty());
    }

    #[tokio::test]
    async fn garbage_and_foreign_topics_are_dropped() {
        let consumer = CategoryConsumer::new(Arc::new(InMemoryDocumentStore::new()));

        assert!(matches!(
            consumer.handle(Topic::CategoryCreated, b"{oops").await,
            ApplyOutcome::Dropped(_)
        ));
        assert!(matches!(
            consumer.handle(Topic::CategoryCreated, &envelope(json!({"name": "no id"}))).await,
            ApplyOutcome::Dropped(_)
        ));
        assert!(matches!(
            consumer.handle(Topic::ProductCreated, &envelope(json!({"id": "x"}))).await,
            ApplyOutcome::Dropped(_)
        ));
    }

    #[tokio::test]
    async fn no_token_needed_for_category_topics() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let consumer = CategoryConsumer::new(store.clone());
        let raw = serde_json::to_vec(&json!({"header": {}, "body": {"id": "c2"}})).unwrap();

        assert_eq!(consumer.handle(Topic::CategoryCreated, &raw).await, ApplyOutcome::Applied);
    }
}
