use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{delete, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    response::{ApiResult, JsonApiResponse},
    state::AppState,
};

use super::{auth::{StatusResponse, UserSummary}, json_body};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserSummary,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(create_user))
        .route("/{id}", delete(delete_user))
        .with_state(state)
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<UserResponse> {
    let body = json_body(payload)?;
    if body.username.is_empty() || body.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }

    let ctx = state.request_context();
    let user = state
        .sessions
        .create_user(&ctx, &body.username, &body.password)
        .await?;
    JsonApiResponse::with_status(
        StatusCode::CREATED,
        "created",
        UserResponse { user: user.into() },
    )
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusResponse> {
    let id = parse_user_id(&id)?;

    let ctx = state.request_context();
    state.sessions.delete_user(&ctx, id).await?;
    JsonApiResponse::ok(StatusResponse { status: "ok" })
}

fn parse_user_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::bad_request("invalid user id")),
    }
}
