use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use catalog_core::{EntityKind, Product};
use catalog_events::{CatalogEvent, DeleteProduct};
use catalog_infra::ListQuery;
use catalog_infra::joiner::ProductView;
use catalog_infra::query::list_records;

use crate::app::dto::{ProductRequest, ReadQuery};
use crate::app::errors;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::middleware::RequestMeta;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListQuery>,
    Query(read): Query<ReadQuery>,
) -> axum::response::Response {
    let page = match list_records::<Product>(services.store.as_ref(), EntityKind::Product, &query).await {
        Ok(page) => page,
        Err(e) => return errors::store_error_to_response(e),
    };

    if read.hydrate() {
        Json(page.map_join(|p| services.joiner.product(p)).await).into_response()
    } else {
        let base_url = services.joiner.base_url();
        Json(page.map(|p| ProductView::shallow(p, base_url))).into_response()
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(read): Query<ReadQuery>,
) -> axum::response::Response {
    let product: Product = match common::load_active(services.store.as_ref(), &id).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if read.hydrate() {
        Json(services.joiner.product(product).await).into_response()
    } else {
        Json(ProductView::shallow(product, services.joiner.base_url())).into_response()
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(meta): Extension<RequestMeta>,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let event = CatalogEvent::ProductCreated(body.into_create(common::new_id()));
    common::publish(&services, &meta, event).await
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<String>,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    if let Err(resp) = common::load_active::<Product>(services.store.as_ref(), &id).await {
        return resp;
    }

    let event = CatalogEvent::ProductUpdated(body.into_update(id));
    common::publish(&services, &meta, event).await
}

/// Publishes `product.deleted`; the consumer cascades to the product's prices.
pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product: Product = match common::load_active(services.store.as_ref(), &id).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let event = CatalogEvent::ProductDeleted(DeleteProduct {
        id: product.id,
        delete_date: Some(Utc::now()),
    });
    common::publish(&services, &meta, event).await
}
