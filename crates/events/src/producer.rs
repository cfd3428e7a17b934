use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::bus::{BrokerError, Delivery, MessageBroker};
use crate::envelope::{Envelope, EnvelopeError, Header};
use crate::event::CatalogEvent;
use crate::topic::Topic;

#[derive(Debug, Error)]
pub enum ProduceError {
    #[error(transparent)]
    Encode(#[from] EnvelopeError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Wraps bodies into envelopes and publishes them, waiting for the broker ack.
///
/// A returned `Ok` means the message has a partition and offset. Callers on
/// the HTTP write path must treat any `Err` as "nothing was created".
#[derive(Clone)]
pub struct EventProducer {
    broker: Arc<dyn MessageBroker>,
}

impl EventProducer {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<dyn MessageBroker> {
        &self.broker
    }

    pub async fn produce<B: Serialize>(
        &self,
        topic: Topic,
        header: Header,
        body: &B,
    ) -> Result<Delivery, ProduceError> {
        let payload = Envelope::new(header, body).encode()?;

        match self.broker.publish(topic, payload).await {
            Ok(delivery) => {
                info!(
                    topic = %topic,
                    partition = delivery.partition,
                    offset = %delivery.offset,
                    "message is stored"
                );
                Ok(delivery)
            }
            Err(err) => {
                error!(topic = %topic, error = %err, "failed to send message");
                Err(err.into())
            }
        }
    }

    pub async fn publish_event(&self, header: Header, event: &CatalogEvent) -> Result<Delivery, ProduceError> {
        let body = event.to_body()?;
        self.produce(event.topic(), header, &body).await
    }
}

impl core::fmt::Debug for EventProducer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventProducer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DeleteProductPrice;
    use crate::in_memory_bus::InMemoryBroker;
    use serde_json::json;

    #[tokio::test]
    async fn produced_message_is_an_envelope() {
        let broker = Arc::new(InMemoryBroker::new(1));
        let producer = EventProducer::new(broker.clone());

        let mut header = Header::new();
        header.insert("request_id".into(), json!("r-1"));
        let event = CatalogEvent::ProductPriceDeleted(DeleteProductPrice {
            id: "p1".into(),
            delete_date: None,
        });

        let delivery = producer.publish_event(header, &event).await.unwrap();
        assert_eq!(delivery.topic, Topic::ProductPriceDeleted);

        let raw = broker.published(Topic::ProductPriceDeleted);
        let env = Envelope::decode(&raw[0]).unwrap();
        assert_eq!(env.header_str("request_id"), Some("r-1"));
        assert_eq!(env.body()["id"], "p1");
    }

    #[tokio::test]
    async fn broker_failure_surfaces_to_caller() {
        let broker = Arc::new(InMemoryBroker::new(1));
        broker.set_unavailable(true);
        let producer = EventProducer::new(broker);

        let err = producer
            .produce(Topic::CategoryCreated, Header::new(), &json!({"id": "c1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProduceError::Broker(BrokerError::Unavailable(_))));
    }
}
