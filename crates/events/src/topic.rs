use core::str::FromStr;

use catalog_core::EntityKind;

use crate::envelope::EnvelopeError;

/// Topic names, one per domain action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    CategoryCreated,
    CategoryUpdated,
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    ProductPriceCreated,
    ProductPriceDeleted,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Self::CategoryCreated,
        Self::CategoryUpdated,
        Self::ProductCreated,
        Self::ProductUpdated,
        Self::ProductDeleted,
        Self::ProductPriceCreated,
        Self::ProductPriceDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CategoryCreated => "category.created",
            Self::CategoryUpdated => "category.updated",
            Self::ProductCreated => "product.created",
            Self::ProductUpdated => "product.updated",
            Self::ProductDeleted => "product.deleted",
            Self::ProductPriceCreated => "productPrice.created",
            Self::ProductPriceDeleted => "productPrice.deleted",
        }
    }

    /// Entity family whose collection this topic mutates.
    pub fn kind(self) -> EntityKind {
        match self {
            Self::CategoryCreated | Self::CategoryUpdated => EntityKind::Category,
            Self::ProductCreated | Self::ProductUpdated | Self::ProductDeleted => EntityKind::Product,
            Self::ProductPriceCreated | Self::ProductPriceDeleted => EntityKind::ProductPrice,
        }
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EnvelopeError::UnknownTopic(s.to_string()))
    }
}
