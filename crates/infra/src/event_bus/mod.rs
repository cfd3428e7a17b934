//! Infrastructure-backed message brokers.
//!
//! The broker abstraction and the in-memory broker live in `catalog-events`.

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsBroker, RedisStreamsError};
