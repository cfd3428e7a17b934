//! Denormalization joiner.
//!
//! Stored records only hold `{id, @type}` references to each other. The joiner
//! replaces every reference with the referenced record's projection, fetched
//! through that entity's own read endpoint. A reference that cannot be fetched
//! (not found, timeout, transport error) degrades to its stub; the parent
//! response never fails because of a sibling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

use catalog_core::{Category, EntityKind, Product, ProductPrice, Reference};

pub mod reader;
pub mod view;

pub use reader::HttpEntityReader;
pub use view::{CategorySummary, CategoryView, Linked, PriceView, ProductSummary, ProductView, Projection};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("referenced record not found")]
    NotFound,

    #[error("fetch timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("undecodable response: {0}")]
    Decode(String),
}

/// Reads one sibling entity by id, in its shallow (non-hydrated) form.
#[async_trait]
pub trait EntityReader: Send + Sync {
    async fn fetch(&self, kind: EntityKind, id: &str) -> Result<JsonValue, FetchError>;
}

#[async_trait]
impl<R> EntityReader for Arc<R>
where
    R: EntityReader + ?Sized,
{
    async fn fetch(&self, kind: EntityKind, id: &str) -> Result<JsonValue, FetchError> {
        (**self).fetch(kind, id).await
    }
}

#[derive(Clone)]
pub struct Joiner {
    reader: Arc<dyn EntityReader>,
    base_url: String,
    timeout: Duration,
}

impl Joiner {
    pub fn new(reader: Arc<dyn EntityReader>, base_url: impl Into<String>) -> Self {
        Self {
            reader,
            base_url: base_url.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base used for every `href`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Hydrate every reference concurrently, keeping list order.
    pub async fn hydrate_refs<T: Projection>(&self, refs: &[Reference]) -> Vec<Linked<T>> {
        join_all(refs.iter().map(|r| self.hydrate_one::<T>(r))).await
    }

    async fn hydrate_one<T: Projection>(&self, reference: &Reference) -> Linked<T> {
        match self.fetch_projection::<T>(&reference.id).await {
            Ok(view) => Linked::Hydrated(view),
            Err(e) => {
                warn!(kind = %T::KIND, id = %reference.id, error = %e, "reference hydration failed, using stub");
                Linked::Stub(Reference::stub(T::KIND, reference.id.clone()))
            }
        }
    }

    async fn fetch_projection<T: Projection>(&self, id: &str) -> Result<T, FetchError> {
        let raw = tokio::time::timeout(self.timeout, self.reader.fetch(T::KIND, id))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let mut view: T = serde_json::from_value(raw).map_err(|e| FetchError::Decode(e.to_string()))?;
        if view.id().is_empty() {
            return Err(FetchError::NotFound);
        }
        let href = T::KIND.href(&self.base_url, view.id());
        view.set_href(href);
        Ok(view)
    }

    /// Product with its categories and prices hydrated.
    pub async fn product(&self, record: Product) -> ProductView {
        let (category, product_price) = futures::join!(
            self.hydrate_refs::<CategorySummary>(&record.category),
            self.hydrate_refs::<PriceView>(&record.product_price),
        );

        let mut view = ProductView::shallow(record, &self.base_url);
        view.category = category;
        view.product_price = product_price;
        view
    }

    /// Category with its products hydrated.
    pub async fn category(&self, record: Category) -> CategoryView {
        let products = self.hydrate_refs::<ProductSummary>(&record.products).await;

        let mut view = CategoryView::shallow(record, &self.base_url);
        view.products = products;
        view
    }

    /// Prices reference nothing; only the `href` is added.
    pub fn price(&self, record: ProductPrice) -> PriceView {
        PriceView::from_record(record, &self.base_url)
    }
}

impl core::fmt::Debug for Joiner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Joiner")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapReader {
        records: HashMap<(EntityKind, String), JsonValue>,
        slow: Vec<String>,
    }

    impl MapReader {
        fn with(mut self, kind: EntityKind, record: JsonValue) -> Self {
            let id = record["id"].as_str().unwrap().to_string();
            self.records.insert((kind, id), record);
            self
        }
    }

    #[async_trait]
    impl EntityReader for MapReader {
        async fn fetch(&self, kind: EntityKind, id: &str) -> Result<JsonValue, FetchError> {
            if self.slow.iter().any(|s| s == id) {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            self.records
                .get(&(kind, id.to_string()))
                .cloned()
                .ok_or(FetchError::NotFound)
        }
    }

    fn product(prices: &[&str], categories: &[&str]) -> Product {
        Product {
            id: "x1".into(),
            kind: "products".into(),
            title: "Mug".into(),
            product_price: prices.iter().map(|id| Reference::stub(EntityKind::ProductPrice, *id)).collect(),
            category: categories.iter().map(|id| Reference::stub(EntityKind::Category, *id)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn failed_reference_degrades_to_stub() {
        let reader = MapReader::default().with(
            EntityKind::ProductPrice,
            json!({"id": "p1", "@type": "productPrice", "name": "retail", "price": {"unit": "THB", "value": 10.0}}),
        );
        let joiner = Joiner::new(Arc::new(reader), "http://shop.test");

        let view = joiner.product(product(&["p1", "p2"], &[])).await;
        let v = serde_json::to_value(&view).unwrap();

        assert_eq!(v["productPrice"][0]["name"], "retail");
        assert_eq!(v["productPrice"][0]["href"], "http://shop.test/productPrice/p1");
        assert_eq!(v["productPrice"][1], json!({"id": "p2", "@type": "productPrice"}));
        assert_eq!(v["href"], "http://shop.test/products/x1");
    }

    #[tokio::test]
    async fn slow_sibling_times_out_without_blocking_others() {
        let reader = MapReader {
            slow: vec!["c-slow".into()],
            ..Default::default()
        }
        .with(EntityKind::Category, json!({"id": "c1", "name": "Kitchen"}));
        let joiner = Joiner::new(Arc::new(reader), "").with_timeout(Duration::from_millis(50));

        let view = joiner.product(product(&[], &["c-slow", "c1"])).await;

        assert!(!view.category[0].is_hydrated());
        assert_eq!(view.category[1].hydrated().map(|c| c.name.as_str()), Some("Kitchen"));
    }

    #[tokio::test]
    async fn category_products_keep_their_price_refs() {
        let reader = MapReader::default().with(
            EntityKind::Product,
            json!({
                "id": "x1",
                "@type": "products",
                "title": "Mug",
                "category": [{"id": "c1", "@type": "category"}],
                "productPrice": [{"id": "p1", "@type": "productPrice"}]
            }),
        );
        let joiner = Joiner::new(Arc::new(reader), "http://shop.test");
        let category = Category {
            id: "c1".into(),
            name: "Kitchen".into(),
            products: vec![Reference::stub(EntityKind::Product, "x1")],
            ..Default::default()
        };

        let view = joiner.category(category).await;
        let hydrated = view.products[0].hydrated().unwrap();

        assert_eq!(hydrated.title, "Mug");
        assert_eq!(hydrated.href, "http://shop.test/products/x1");
        assert_eq!(hydrated.product_price, vec![Reference::stub(EntityKind::ProductPrice, "p1")]);
    }

    #[tokio::test]
    async fn record_without_id_counts_as_missing() {
        let reader = MapReader::default().with(EntityKind::ProductPrice, json!({"id": ""}));
        let joiner = Joiner::new(Arc::new(reader), "");

        let linked = joiner
            .hydrate_refs::<PriceView>(&[Reference::stub(EntityKind::ProductPrice, "")])
            .await;
        assert!(!linked[0].is_hydrated());
    }
}
