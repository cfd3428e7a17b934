//! `catalog-core`: catalog domain records and identifiers.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the three entity records, their reference stubs, ids and hyperlinks.

pub mod error;
pub mod id;
pub mod kind;
pub mod record;
pub mod time;

pub use error::DomainError;
pub use id::EntityId;
pub use kind::EntityKind;
pub use record::{Category, Price, Product, ProductPrice, Record, Reference, normalize_refs};
