//! `catalog-events`: the wire contract between the write path and consumers.
//!
//! - [`Topic`]: fixed topic name per domain action (the topic *is* the body type)
//! - [`Envelope`]: `{header, body}` wrapper carried by every message
//! - [`CatalogEvent`]: sum type of all bodies, decoded by topic
//! - [`MessageBroker`]: transport abstraction + [`InMemoryBroker`]
//! - [`EventProducer`]: synchronous, acknowledged publishing

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod producer;
pub mod topic;

pub use bus::{BrokerError, Delivery, MessageBroker, PartitionClaim, ReceivedMessage};
pub use command::{
    CreateCategory, CreateProduct, CreateProductPrice, DeleteProduct, DeleteProductPrice,
    UpdateCategory, UpdateProduct,
};
pub use envelope::{Envelope, EnvelopeError, Header};
pub use event::CatalogEvent;
pub use in_memory_bus::InMemoryBroker;
pub use producer::{EventProducer, ProduceError};
pub use topic::Topic;
