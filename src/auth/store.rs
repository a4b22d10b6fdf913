//! Capability contracts the session core consumes from storage.
//!
//! Only the operations the core needs are exposed here; connection pooling,
//! SQL and migrations live behind the implementations in `crate::db`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated")]
    Duplicate,
    #[error("storage is not wired up")]
    Detached,
    #[error("storage failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored user row as handed to the core by a [`UserRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            last_login_at: record.last_login_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    /// Stamped into both `created_at` and `updated_at`.
    pub created_at: DateTime<Utc>,
}

/// Usernames are unique without regard to case; stores key on this form.
pub fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Case-insensitive lookup.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>>;
    /// `StoreError::Duplicate` when the username is taken.
    async fn add(&self, user: NewUser) -> StoreResult<UserRecord>;
    /// `StoreError::NotFound` when no row was removed.
    async fn delete(&self, id: i64) -> StoreResult<()>;
    async fn set_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRefreshToken {
    pub jti: Uuid,
    pub user_id: i64,
    pub secret_hash: String,
    pub user_agent: String,
    pub ip: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub jti: Uuid,
    pub user_id: i64,
    pub secret_hash: String,
    pub user_agent: String,
    pub ip: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Unrevoked and not yet past its absolute expiry.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

impl From<NewRefreshToken> for RefreshTokenRecord {
    fn from(token: NewRefreshToken) -> Self {
        Self {
            jti: token.jti,
            user_id: token.user_id,
            secret_hash: token.secret_hash,
            user_agent: token.user_agent,
            ip: token.ip,
            expires_at: token.expires_at,
            revoked: false,
            created_at: token.created_at,
        }
    }
}

/// Durable record of issued refresh tokens, keyed by jti.
///
/// Records are only ever flipped to revoked, never removed by the core.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, token: NewRefreshToken) -> StoreResult<()>;

    /// `StoreError::NotFound` if no record has this jti. Revoking an
    /// already-revoked record succeeds.
    async fn revoke_by_jti(&self, jti: Uuid) -> StoreResult<()>;

    /// Returns how many live records were revoked.
    async fn revoke_all_by_user(&self, user_id: i64) -> StoreResult<u64>;

    /// Returns the record whatever its state, so the caller can tell an
    /// absent jti from a dead one. `StoreError::NotFound` if absent.
    async fn find_by_jti(&self, jti: Uuid) -> StoreResult<RefreshTokenRecord>;

    /// Revokes `old_jti` and stores `replacement` as one atomic step, but only
    /// if `old_jti` is still live at `now`.
    ///
    /// Returns `true` for exactly one caller per jti; every concurrent or
    /// later attempt sees `false` and leaves nothing behind. A caller that
    /// sees `false` can rely on the winner's replacement already being
    /// visible to [`RefreshTokenStore::revoke_all_by_user`].
    async fn rotate(
        &self,
        old_jti: Uuid,
        replacement: NewRefreshToken,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;
}
