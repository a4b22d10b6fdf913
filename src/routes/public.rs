use axum::{Router, routing::get};

use crate::response::{ApiResult, JsonApiResponse};

pub fn router() -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
}

async fn ping() -> ApiResult<&'static str> {
    JsonApiResponse::ok("pong")
}

async fn health() -> ApiResult<&'static str> {
    JsonApiResponse::ok("OK")
}
