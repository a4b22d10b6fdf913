use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::store::{
    NewRefreshToken, RefreshTokenRecord, RefreshTokenStore, StoreError, StoreResult,
};

/// Stand-in used when refresh persistence is switched off.
///
/// Every call reports [`StoreError::Detached`]. Logins still succeed with a
/// warning, but the refresh tokens they hand out can never be redeemed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedRefreshStore;

#[async_trait]
impl RefreshTokenStore for DetachedRefreshStore {
    async fn create(&self, _token: NewRefreshToken) -> StoreResult<()> {
        Err(StoreError::Detached)
    }

    async fn revoke_by_jti(&self, _jti: Uuid) -> StoreResult<()> {
        Err(StoreError::Detached)
    }

    async fn revoke_all_by_user(&self, _user_id: i64) -> StoreResult<u64> {
        Err(StoreError::Detached)
    }

    async fn find_by_jti(&self, _jti: Uuid) -> StoreResult<RefreshTokenRecord> {
        Err(StoreError::Detached)
    }

    async fn rotate(
        &self,
        _old_jti: Uuid,
        _replacement: NewRefreshToken,
        _now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Err(StoreError::Detached)
    }
}
