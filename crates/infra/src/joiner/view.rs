//! Response projections of stored records.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use catalog_core::{Category, EntityKind, Price, Product, ProductPrice, Reference};

/// A reference as it appears in a response: hydrated, or the bare stub when
/// the referenced record could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linked<T> {
    Hydrated(T),
    Stub(Reference),
}

impl<T> Linked<T> {
    pub fn is_hydrated(&self) -> bool {
        matches!(self, Self::Hydrated(_))
    }

    pub fn hydrated(&self) -> Option<&T> {
        match self {
            Self::Hydrated(v) => Some(v),
            Self::Stub(_) => None,
        }
    }
}

fn stubs<T>(refs: &[Reference]) -> Vec<Linked<T>> {
    refs.iter().cloned().map(Linked::Stub).collect()
}

/// A projection that can stand in for a hydrated reference.
pub trait Projection: DeserializeOwned + Serialize + Send + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn set_href(&mut self, href: String);
}

/// Product price as returned by `/productPrice/{id}` and inside products.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceView {
    pub id: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, with = "catalog_core::time::lenient")]
    pub last_update: Option<DateTime<Utc>>,
}

impl PriceView {
    pub fn from_record(record: ProductPrice, base_url: &str) -> Self {
        Self {
            href: EntityKind::ProductPrice.href(base_url, &record.id),
            id: record.id,
            kind: EntityKind::ProductPrice.type_name().to_string(),
            status: record.status,
            name: record.name,
            price: record.price,
            last_update: record.last_update,
        }
    }
}

/// Category as embedded in a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, with = "catalog_core::time::lenient")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Product as embedded in a category; its prices stay as references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub product_price: Vec<Reference>,
    #[serde(default, with = "catalog_core::time::lenient")]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub href: String,
    pub status: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub category: Vec<Linked<CategorySummary>>,
    pub product_price: Vec<Linked<PriceView>>,
    #[serde(default, with = "catalog_core::time::lenient")]
    pub last_update: Option<DateTime<Utc>>,
}

impl ProductView {
    /// The product with every reference left as a stub.
    pub fn shallow(record: Product, base_url: &str) -> Self {
        Self {
            href: EntityKind::Product.href(base_url, &record.id),
            kind: EntityKind::Product.type_name().to_string(),
            category: stubs(&record.category),
            product_price: stubs(&record.product_price),
            id: record.id,
            status: record.status,
            title: record.title,
            description: record.description,
            image: record.image,
            last_update: record.last_update,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub href: String,
    pub name: String,
    pub status: String,
    pub products: Vec<Linked<ProductSummary>>,
    #[serde(default, with = "catalog_core::time::lenient")]
    pub last_update: Option<DateTime<Utc>>,
}

impl CategoryView {
    pub fn shallow(record: Category, base_url: &str) -> Self {
        Self {
            href: EntityKind::Category.href(base_url, &record.id),
            kind: EntityKind::Category.type_name().to_string(),
            products: stubs(&record.products),
            id: record.id,
            name: record.name,
            status: record.status,
            last_update: record.last_update,
        }
    }
}

macro_rules! impl_projection {
    ($t:ty, $kind:expr) => {
        impl Projection for $t {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_href(&mut self, href: String) {
                self.href = href;
            }
        }
    };
}

impl_projection!(PriceView, EntityKind::ProductPrice);
impl_projection!(CategorySummary, EntityKind::Category);
impl_projection!(ProductSummary, EntityKind::Product);
