use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    response::IntoResponse,
    routing::get,
};

use catalog_core::{Category, EntityKind};
use catalog_events::CatalogEvent;
use catalog_infra::ListQuery;
use catalog_infra::joiner::CategoryView;
use catalog_infra::query::list_records;

use crate::app::dto::{CategoryRequest, ReadQuery};
use crate::app::errors;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::middleware::RequestMeta;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", get(get_category).patch(update_category))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListQuery>,
    Query(read): Query<ReadQuery>,
) -> axum::response::Response {
    let page = match list_records::<Category>(services.store.as_ref(), EntityKind::Category, &query).await {
        Ok(page) => page,
        Err(e) => return errors::store_error_to_response(e),
    };

    if read.hydrate() {
        Json(page.map_join(|c| services.joiner.category(c)).await).into_response()
    } else {
        let base_url = services.joiner.base_url();
        Json(page.map(|c| CategoryView::shallow(c, base_url))).into_response()
    }
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(read): Query<ReadQuery>,
) -> axum::response::Response {
    let category: Category = match common::load_active(services.store.as_ref(), &id).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if read.hydrate() {
        Json(services.joiner.category(category).await).into_response()
    } else {
        Json(CategoryView::shallow(category, services.joiner.base_url())).into_response()
    }
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(meta): Extension<RequestMeta>,
    body: Result<Json<CategoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let event = CatalogEvent::CategoryCreated(body.into_create(common::new_id()));
    common::publish(&services, &meta, event).await
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<String>,
    body: Result<Json<CategoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    if let Err(resp) = common::load_active::<Category>(services.store.as_ref(), &id).await {
        return resp;
    }

    let event = CatalogEvent::CategoryUpdated(body.into_update(id));
    common::publish(&services, &meta, event).await
}
