use axum::{Router, routing::get};

pub mod category;
pub mod common;
pub mod prices;
pub mod products;
pub mod system;

/// Router for every endpoint. Collection paths match each entity's `@type`
/// href segment, so hrefs resolve against this router.
pub fn router() -> Router {
    Router::new()
        .route("/", get(system::info))
        .route("/healthz", get(system::health))
        .nest("/products", products::router())
        .nest("/productPrice", prices::router())
        .nest("/category", category::router())
}
