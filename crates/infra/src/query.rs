//! List queries: search, price sort and fixed-size pages.

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use catalog_core::EntityKind;

use crate::document_store::{DocumentStore, Filter, FindOptions, Sort, SortDirection, StoreError, TextMatch};

pub const PAGE_SIZE: u64 = 9;

/// Sort key shared by every list endpoint.
pub const SORT_FIELD: &str = "price.value";

/// Raw list parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

/// Store-level form of a [`ListQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub filter: Filter,
    pub options: FindOptions,
    pub page: u64,
}

impl ListQuery {
    /// 1-based page; missing, unparsable, zero or negative pages are page 1.
    pub fn page_number(&self) -> u64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p > 0)
            .map_or(1, |p| p as u64)
    }

    pub fn direction(&self) -> Option<SortDirection> {
        match self.sort.as_deref() {
            Some("asc") => Some(SortDirection::Asc),
            Some("desc") => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn plan(&self, kind: EntityKind) -> QueryPlan {
        let page = self.page_number();

        let mut filter = Filter::active();
        if let Some(s) = self.s.as_deref().filter(|s| !s.is_empty()) {
            filter = filter.with_text(TextMatch::new(s, searchable_fields(kind)));
        }

        let options = FindOptions {
            sort: self.direction().map(|direction| Sort {
                field: SORT_FIELD,
                direction,
            }),
            skip: (page - 1).saturating_mul(PAGE_SIZE),
            limit: Some(PAGE_SIZE),
        };

        QueryPlan { filter, options, page }
    }
}

/// String fields matched by the `s` search term.
pub fn searchable_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Product => &["title", "description"],
        EntityKind::Category | EntityKind::ProductPrice => &["name"],
    }
}

/// `ceil(total / PAGE_SIZE)`.
pub fn last_page(total: u64) -> u64 {
    total.div_ceil(PAGE_SIZE)
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, page: u64) -> Self {
        Self {
            data,
            total,
            page,
            last_page: last_page(total),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            last_page: self.last_page,
        }
    }

    /// Like [`Page::map`] with an async `f`; items run concurrently and keep
    /// their order.
    pub async fn map_join<U, Fut>(self, f: impl FnMut(T) -> Fut) -> Page<U>
    where
        Fut: Future<Output = U>,
    {
        Page {
            data: join_all(self.data.into_iter().map(f)).await,
            total: self.total,
            page: self.page,
            last_page: self.last_page,
        }
    }
}

/// Run `query` against `kind`'s collection and decode the page's records.
/// Documents that do not decode are skipped (and logged); `total` still
/// counts them.
pub async fn list_records<R: DeserializeOwned>(
    store: &dyn DocumentStore,
    kind: EntityKind,
    query: &ListQuery,
) -> Result<Page<R>, StoreError> {
    let plan = query.plan(kind);
    let (docs, total) = store.find(kind.collection(), &plan.filter, &plan.options).await?;

    let data = docs
        .into_iter()
        .filter_map(|doc: JsonValue| match serde_json::from_value::<R>(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = kind.collection(), error = %e, "skipping undecodable document");
                None
            }
        })
        .collect();

    Ok(Page::new(data, total, plan.page))
}
