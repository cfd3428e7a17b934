//! Idempotent apply engine.
//!
//! A consumer turns each delivered message into at most one document mutation:
//!
//! 1. decode the envelope (failure: drop)
//! 2. decode the body by topic (failure: drop)
//! 3. dispatch to create / update / delete
//!
//! The outcome is reported to the worker, which commits the offset no matter
//! what it was. There is no retry and no dead-letter queue.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use catalog_auth::TokenError;
use catalog_core::EntityKind;
use catalog_events::envelope::AUTHORIZATION;
use catalog_events::{EnvelopeError, Header, ProduceError, Topic};

use crate::document_store::StoreError;

pub mod apply;
pub mod category;
pub mod product;

pub use category::CategoryConsumer;
pub use product::ProductConsumer;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("decode failed: {0}")]
    Decode(#[from] EnvelopeError),

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] TokenError),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cascade publish failed: {0}")]
    Cascade(#[from] ProduceError),

    #[error("topic {0} is not handled by this consumer")]
    UnexpectedTopic(Topic),
}

/// What happened to one message. Never affects the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The mutation was applied.
    Applied,
    /// The message could not be decoded and was discarded.
    Dropped(String),
    /// The message failed the authorization gate and was not applied.
    Rejected(String),
    /// Decoding succeeded but applying failed (store error, not found, ...).
    Failed(String),
}

impl ApplyOutcome {
    pub fn from_result(result: Result<(), ApplyError>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(e @ (ApplyError::Decode(_) | ApplyError::UnexpectedTopic(_))) => Self::Dropped(e.to_string()),
            Err(e @ ApplyError::Unauthorized(_)) => Self::Rejected(e.to_string()),
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Dropped(_) => "dropped",
            Self::Rejected(_) => "rejected",
            Self::Failed(_) => "failed",
        }
    }
}

/// A consumer group's message handler.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Broker consumer group id.
    fn group_id(&self) -> &str;

    /// Topics this group subscribes to.
    fn topics(&self) -> &[Topic];

    /// Process one raw message. Must not panic on bad input.
    async fn handle(&self, topic: Topic, payload: &[u8]) -> ApplyOutcome;
}

/// Header copy safe to log: the bearer credential is masked.
pub fn loggable_header(header: &Header) -> BTreeMap<&str, JsonValue> {
    header
        .iter()
        .map(|(k, v)| {
            if k == AUTHORIZATION {
                (k.as_str(), JsonValue::String("<redacted>".to_string()))
            } else {
                (k.as_str(), v.clone())
            }
        })
        .collect()
}
