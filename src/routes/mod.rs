mod auth;
mod guards;
mod public;
mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::{Method, Uri},
};

use crate::{
    error::AppError,
    middleware::{
        catch_panic_layer, propagate_request_id_layer, request_trace_layer, set_request_id_layer,
    },
    state::AppState,
};

pub use guards::{AuthUser, ClientDevice};

pub const API_PREFIX: &str = "/api/v1";

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(public::router())
        .nest("/auth", auth::router(state.clone()))
        .nest("/users", users::router(state));
    Router::new()
        .nest(API_PREFIX, api)
        .fallback(route_not_found)
}

/// The router wrapped in the full middleware stack, outermost last:
/// panic recovery, request id propagation, tracing, request id assignment.
pub fn app(state: Arc<AppState>) -> Router {
    router(state)
        .layer(catch_panic_layer())
        .layer(propagate_request_id_layer())
        .layer(request_trace_layer())
        .layer(set_request_id_layer())
}

async fn route_not_found(method: Method, uri: Uri) -> AppError {
    tracing::warn!(%method, %uri, "no route matched");
    AppError::not_found("route not found")
}

/// Unwraps a JSON body, turning any extractor rejection into a 400 with the
/// API envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected request body");
            Err(AppError::bad_request("invalid request body"))
        }
    }
}
