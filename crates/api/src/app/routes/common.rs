use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use catalog_core::{DomainError, EntityId, Record};
use catalog_events::CatalogEvent;
use catalog_infra::DocumentStore;
use catalog_infra::document_store::Filter;

use crate::app::dto::Accepted;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::middleware::RequestMeta;

/// Fresh id for a record about to be created.
pub fn new_id() -> String {
    EntityId::generate().into_string()
}

/// Load a record that has not been deleted; 404 otherwise.
pub async fn load_active<R: Record>(store: &dyn DocumentStore, id: &str) -> Result<R, Response> {
    let id: EntityId = id
        .parse()
        .map_err(|e: DomainError| errors::json_error(StatusCode::NOT_FOUND, "not_found", e.to_string()))?;

    let doc = store
        .find_one(R::KIND.collection(), &Filter::active_by_id(id.as_str()))
        .await
        .map_err(errors::store_error_to_response)?;

    serde_json::from_value(doc).map_err(|e| {
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "decode_error", e.to_string())
    })
}

/// Publish `event` with the request's captured metadata as its header and
/// answer once the broker has acknowledged it.
pub async fn publish(services: &AppServices, meta: &RequestMeta, event: CatalogEvent) -> Response {
    let id = event.id().to_string();
    match services.producer.publish_event(meta.header(), &event).await {
        Ok(_) => Json(Accepted::new(id)).into_response(),
        Err(e) => errors::produce_error_to_response(e),
    }
}
