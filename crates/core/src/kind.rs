//! Entity kinds: the fixed `@type` per record and its owning collection.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The three catalog entity families.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "category")]
    Category,
    #[serde(rename = "products")]
    Product,
    #[serde(rename = "productPrice")]
    ProductPrice,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Category, Self::Product, Self::ProductPrice];

    /// Value of the record's `@type` field, also the hyperlink path segment.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "products",
            Self::ProductPrice => "productPrice",
        }
    }

    /// Name of the store collection holding records of this kind.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
            Self::ProductPrice => "productPrice",
        }
    }

    /// `base_url/<type>/<id>`.
    pub fn href(self, base_url: &str, id: &str) -> String {
        format!("{}/{}/{}", base_url.trim_end_matches('/'), self.type_name(), id)
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.type_name() == s)
            .ok_or_else(|| DomainError::UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_is_base_type_id() {
        assert_eq!(
            EntityKind::ProductPrice.href("http://localhost:8080", "p1"),
            "http://localhost:8080/productPrice/p1"
        );
        assert_eq!(
            EntityKind::Product.href("http://host/", "x"),
            "http://host/products/x"
        );
        assert_eq!(EntityKind::Category.href("", "c"), "/category/c");
    }

    #[test]
    fn product_type_differs_from_collection() {
        assert_eq!(EntityKind::Product.type_name(), "products");
        assert_eq!(EntityKind::Product.collection(), "product");
    }

    #[test]
    fn type_names_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.type_name().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("product".parse::<EntityKind>().is_err());
    }
}
