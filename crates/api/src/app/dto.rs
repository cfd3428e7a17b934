use serde::{Deserialize, Serialize};

use catalog_core::{DomainError, EntityKind, Price, Reference, normalize_refs};
use catalog_events::{
    CreateCategory, CreateProduct, CreateProductPrice, UpdateCategory, UpdateProduct,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: Vec<Reference>,
    #[serde(default)]
    pub product_price: Vec<Reference>,
}

impl ProductRequest {
    pub fn into_create(self, id: String) -> CreateProduct {
        CreateProduct {
            id,
            status: self.status,
            title: self.title,
            description: self.description,
            image: self.image,
            category: normalize_refs(self.category, EntityKind::Category),
            product_price: normalize_refs(self.product_price, EntityKind::ProductPrice),
            last_update: None,
        }
    }

    pub fn into_update(self, id: String) -> UpdateProduct {
        UpdateProduct {
            id,
            status: self.status,
            title: self.title,
            description: self.description,
            image: self.image,
            category: normalize_refs(self.category, EntityKind::Category),
            product_price: normalize_refs(self.product_price, EntityKind::ProductPrice),
            last_update: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductPriceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub price: Option<Price>,
}

/// Statuses a price may be created with (empty means unset).
pub const PRICE_STATUSES: [&str; 2] = ["active", "inActive"];

impl ProductPriceRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.status.is_empty() || PRICE_STATUSES.contains(&self.status.as_str()) {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "status must be one of: {}",
                PRICE_STATUSES.join(", ")
            )))
        }
    }

    pub fn into_create(self, id: String) -> CreateProductPrice {
        CreateProductPrice {
            id,
            name: self.name,
            status: self.status,
            price: self.price,
            last_update: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub products: Vec<Reference>,
}

impl CategoryRequest {
    pub fn into_create(self, id: String) -> CreateCategory {
        CreateCategory {
            id,
            name: self.name,
            status: self.status,
            products: normalize_refs(self.products, EntityKind::Product),
            last_update: None,
        }
    }

    pub fn into_update(self, id: String) -> UpdateCategory {
        UpdateCategory {
            id,
            name: self.name,
            status: self.status,
            products: normalize_refs(self.products, EntityKind::Product),
            last_update: None,
        }
    }
}

/// `?hydrate=false` asks a read (single or list) for the shallow projection.
#[derive(Debug, Default, Deserialize)]
pub struct ReadQuery {
    #[serde(default)]
    pub hydrate: Option<String>,
}

impl ReadQuery {
    pub fn hydrate(&self) -> bool {
        !matches!(self.hydrate.as_deref(), Some("false"))
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// Answer to every accepted write.
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub message: &'static str,
    pub id: String,
}

impl Accepted {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            message: "success",
            id: id.into(),
        }
    }
}
