//! Message broker abstraction (mechanics only).
//!
//! The broker is the transport between the HTTP write path and the consumer
//! groups. It makes minimal promises:
//!
//! - **Acknowledged publish**: `publish` returns only after the broker assigned
//!   the message a partition and offset.
//! - **At-least-once**: anything not committed by a group may be delivered to
//!   that group again. Consumers must be idempotent.
//! - **No ordering across partitions**: messages are not keyed, so two events
//!   for the same entity may land on different partitions.
//! - **Per-claim ordering**: within one partition claim, messages arrive in
//!   offset order.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::topic::Topic;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("broker connection error: {0}")]
    Connection(String),

    #[error("broker command error: {0}")]
    Command(String),

    #[error("invalid offset: {0}")]
    InvalidOffset(String),

    #[error("broker state lock poisoned")]
    Poisoned,
}

/// Broker acknowledgement of a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: Topic,
    pub partition: u32,
    pub offset: String,
}

/// A message handed to a consumer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: Topic,
    pub partition: u32,
    pub offset: String,
    pub payload: Vec<u8>,
}

/// One partition of one topic, claimed by a consumer group.
///
/// Messages on a claim are delivered strictly in offset order. The channel
/// closes when the broker drops the claim.
#[derive(Debug)]
pub struct PartitionClaim {
    pub topic: Topic,
    pub partition: u32,
    receiver: mpsc::UnboundedReceiver<ReceivedMessage>,
}

impl PartitionClaim {
    pub fn new(
        topic: Topic,
        partition: u32,
        receiver: mpsc::UnboundedReceiver<ReceivedMessage>,
    ) -> Self {
        Self {
            topic,
            partition,
            receiver,
        }
    }

    /// Wait for the next message. `None` once the claim is closed.
    pub async fn recv(&mut self) -> Option<ReceivedMessage> {
        self.receiver.recv().await
    }

    /// Take a message if one is immediately available.
    pub fn try_recv(&mut self) -> Option<ReceivedMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Transport-agnostic message broker.
///
/// ```text
/// HTTP write → EventProducer → publish(topic) → partitions
///                                                  ├─ claim (group A) → worker → commit
///                                                  └─ claim (group B) → worker → commit
/// ```
///
/// Each consumer group sees every message of the topics it subscribed to;
/// the group's committed offset decides where a new subscription resumes.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Append a message and wait for its partition/offset assignment.
    async fn publish(&self, topic: Topic, payload: Vec<u8>) -> Result<Delivery, BrokerError>;

    /// Claim every partition of `topics` for `group`, resuming after the
    /// group's last committed offset.
    async fn subscribe(&self, group: &str, topics: &[Topic]) -> Result<Vec<PartitionClaim>, BrokerError>;

    /// Mark `message` as processed for `group`.
    async fn commit(&self, group: &str, message: &ReceivedMessage) -> Result<(), BrokerError>;
}

#[async_trait]
impl<B> MessageBroker for Arc<B>
where
    B: MessageBroker + ?Sized,
{
    async fn publish(&self, topic: Topic, payload: Vec<u8>) -> Result<Delivery, BrokerError> {
        (**self).publish(topic, payload).await
    }

    async fn subscribe(&self, group: &str, topics: &[Topic]) -> Result<Vec<PartitionClaim>, BrokerError> {
        (**self).subscribe(group, topics).await
    }

    async fn commit(&self, group: &str, message: &ReceivedMessage) -> Result<(), BrokerError> {
        (**self).commit(group, message).await
    }
}
