//! Infrastructure layer: document stores, consumers, brokers, joiner, config.
//!
//! - [`document_store`]: collection-oriented JSON store (in-memory, Postgres)
//! - [`consumers`]: idempotent apply engine, one handler per consumer group
//! - [`workers`]: runs a handler against a broker, one task per partition
//! - [`joiner`]: hydrates reference stubs through sibling read endpoints
//! - [`query`]: list search, sort and pagination
//! - [`event_bus`]: Redis Streams broker (feature `redis`)
//! - [`config`]: environment configuration

pub mod config;
pub mod consumers;
pub mod document_store;
pub mod event_bus;
pub mod joiner;
pub mod query;
pub mod workers;


pub use config::{AuthConfig, AuthKey, CatalogConfig, ConfigError};
pub use consumers::{ApplyError, ApplyOutcome, CategoryConsumer, MessageHandler, ProductConsumer};
pub use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, StoreError};
pub use joiner::{EntityReader, FetchError, HttpEntityReader, Joiner};
pub use query::{ListQuery, Page, QueryPlan};
pub use workers::{ConsumerWorker, WorkerHandle};
