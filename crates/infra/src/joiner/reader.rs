use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use tracing::debug;

use catalog_core::EntityKind;

use super::{EntityReader, FetchError};

/// Reads sibling entities through the service's public read endpoints:
/// `GET <service_url>/<type>/<id>?hydrate=false`.
///
/// `hydrate=false` asks for the shallow projection, so hydrating a product's
/// categories never recurses back into their products.
#[derive(Debug, Clone)]
pub struct HttpEntityReader {
    client: Client,
    service_url: String,
}

impl HttpEntityReader {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), service_url)
    }

    pub fn with_client(client: Client, service_url: impl Into<String>) -> Self {
        Self {
            client,
            service_url: service_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/{}/{}?hydrate=false", self.service_url, kind.type_name(), id)
    }
}

#[async_trait]
impl EntityReader for HttpEntityReader {
    async fn fetch(&self, kind: EntityKind, id: &str) -> Result<JsonValue, FetchError> {
        let url = self.url(kind, id);
        debug!(%url, "fetching sibling entity");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound),
            status if !status.is_success() => return Err(FetchError::Status(status.as_u16())),
            _ => {}
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn price(
        Path(id): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<JsonValue>, AxumStatus> {
        if params.get("hydrate").map(String::as_str) != Some("false") {
            return Err(AxumStatus::BAD_REQUEST);
        }
        match id.as_str() {
            "p1" => Ok(Json(json!({"id": "p1", "@type": "productPrice", "name": "retail"}))),
            "boom" => Err(AxumStatus::INTERNAL_SERVER_ERROR),
            _ => Err(AxumStatus::NOT_FOUND),
        }
    }

    async fn serve() -> String {
        let app = Router::new().route("/productPrice/:id", get(price));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn fetches_shallow_form_and_maps_statuses() {
        let reader = HttpEntityReader::new(serve().await);

        let doc = reader.fetch(EntityKind::ProductPrice, "p1").await.unwrap();
        assert_eq!(doc["name"], "retail");

        assert_eq!(
            reader.fetch(EntityKind::ProductPrice, "nope").await,
            Err(FetchError::NotFound)
        );
        assert_eq!(
            reader.fetch(EntityKind::ProductPrice, "boom").await,
            Err(FetchError::Status(500))
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let reader = HttpEntityReader::new("http://127.0.0.1:1");
        assert!(matches!(
            reader.fetch(EntityKind::Category, "c1").await,
            Err(FetchError::Transport(_))
        ));
    }
}
