//! Event bodies, one per topic.
//!
//! Field names follow the wire format the HTTP service emits: camelCase with
//! `@type` for entity fields, snake_case `delete_date` on delete bodies. Empty
//! strings and zero timestamps mean "not provided".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{Price, Reference};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategory {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<Reference>,
    #[serde(default, with = "catalog_core::time::lenient", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategory {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<Reference>,
    #[serde(default, with = "catalog_core::time::lenient", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_price: Vec<Reference>,
    #[serde(default, with = "catalog_core::time::lenient", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Partial product update. Carries the target id so consumers can locate the
/// record without relying on message keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_price: Vec<Reference>,
    #[serde(default, with = "catalog_core::time::lenient", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub id: String,
    #[serde(default, with = "catalog_core::time::lenient")]
    pub delete_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPrice {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, with = "catalog_core::time::lenient", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProductPrice {
    pub id: String,
    #[serde(default, with = "catalog_core::time::lenient")]
    pub delete_date: Option<DateTime<Utc>>,
}
