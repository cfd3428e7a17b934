use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use catalog_core::{EntityKind, ProductPrice};
use catalog_events::{CatalogEvent, DeleteProductPrice};
use catalog_infra::ListQuery;
use catalog_infra::joiner::PriceView;
use catalog_infra::query::list_records;

use crate::app::dto::ProductPriceRequest;
use crate::app::errors;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::middleware::RequestMeta;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_prices).post(create_price))
        .route("/:id", get(get_price).delete(delete_price))
}

pub async fn list_prices(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    match list_records::<ProductPrice>(services.store.as_ref(), EntityKind::ProductPrice, &query).await {
        Ok(page) => {
            let base_url = services.joiner.base_url();
            Json(page.map(|p| PriceView::from_record(p, base_url))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Prices reference nothing, so hydrated and shallow reads are the same.
pub async fn get_price(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match common::load_active::<ProductPrice>(services.store.as_ref(), &id).await {
        Ok(price) => Json(services.joiner.price(price)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn create_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(meta): Extension<RequestMeta>,
    body: Result<Json<ProductPriceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    if let Err(e) = body.validate() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
    }

    let event = CatalogEvent::ProductPriceCreated(body.into_create(common::new_id()));
    common::publish(&services, &meta, event).await
}

pub async fn delete_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let price: ProductPrice = match common::load_active(services.store.as_ref(), &id).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let event = CatalogEvent::ProductPriceDeleted(DeleteProductPrice {
        id: price.id,
        delete_date: Some(Utc::now()),
    });
    common::publish(&services, &meta, event).await
}
