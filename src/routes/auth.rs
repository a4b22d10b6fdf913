use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::User,
    error::AppError,
    response::{ApiResult, JsonApiResponse},
    services::Session,
    state::AppState,
};

use super::{AuthUser, ClientDevice, json_body};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub access: String,
    pub refresh: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: UserSummary,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            access: session.tokens.access,
            refresh: session.tokens.refresh,
            token_type: session.tokens.token_type,
            expires_in: session.tokens.expires_in,
            user: session.user.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub status: &'static str,
    pub revoked: u64,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .with_state(state)
}

async fn login(
    State(state): State<Arc<AppState>>,
    device: ClientDevice,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<SessionResponse> {
    let body = json_body(payload)?;
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }

    let ctx = state.request_context();
    let session = state
        .sessions
        .login(&ctx, &body.username, &body.password, device.into())
        .await?;
    JsonApiResponse::ok(session.into())
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    device: ClientDevice,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<SessionResponse> {
    let body = json_body(payload)?;
    if body.refresh.is_empty() {
        return Err(AppError::bad_request("refresh token is required"));
    }

    let ctx = state.request_context();
    let session = state
        .sessions
        .refresh(&ctx, &body.refresh, device.into())
        .await?;
    JsonApiResponse::ok(session.into())
}

async fn logout(
    State(state): State<Arc<AppState>>,
    device: ClientDevice,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let body = json_body(payload)?;
    if body.refresh.is_empty() {
        return Err(AppError::bad_request("refresh token is required"));
    }

    let ctx = state.request_context();
    state
        .sessions
        .logout(&ctx, &body.refresh, device.into())
        .await?;
    JsonApiResponse::ok(StatusResponse { status: "ok" })
}

async fn logout_all(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<RevokedResponse> {
    let ctx = state.request_context();
    let revoked = state.sessions.logout_all(&ctx, user.user_id).await?;
    JsonApiResponse::ok(RevokedResponse {
        status: "ok",
        revoked,
    })
}
