use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::store::{
    NewRefreshToken, NewUser, RefreshTokenRecord, RefreshTokenStore, StoreError, StoreResult,
    UserRecord, UserRepository, username_key,
};

#[derive(Default)]
struct State {
    next_user_id: i64,
    users: HashMap<i64, UserRecord>,
    refresh_tokens: HashMap<Uuid, RefreshTokenRecord>,
}

/// Process-local store backing both user and refresh-token contracts.
///
/// Used when no database is configured and throughout the tests. One lock
/// guards all state, so `rotate` is trivially atomic. Deleting a user
/// leaves their refresh records in place.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every refresh record issued to `user_id`, in no order.
    pub fn refresh_tokens_for(&self, user_id: i64) -> Vec<RefreshTokenRecord> {
        self.lock()
            .refresh_tokens
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let key = username_key(username);
        Ok(self
            .lock()
            .users
            .values()
            .find(|user| username_key(&user.username) == key)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn add(&self, new_user: NewUser) -> StoreResult<UserRecord> {
        let mut state = self.lock();
        let key = username_key(&new_user.username);
        if state
            .users
            .values()
            .any(|user| username_key(&user.username) == key)
        {
            return Err(StoreError::Duplicate);
        }

        state.next_user_id += 1;
        let record = UserRecord {
            id: state.next_user_id,
            username: new_user.username,
            password_hash: new_user.password_hash,
            last_login_at: None,
            created_at: new_user.created_at,
            updated_at: new_user.created_at,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let mut state = self.lock();
        state.users.remove(&id).ok_or(StoreError::NotFound)?;
        Ok(())
    }

    async fn set_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.lock();
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.last_login_at = Some(at);
        user.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn create(&self, token: NewRefreshToken) -> StoreResult<()> {
        let mut state = self.lock();
        if state.refresh_tokens.contains_key(&token.jti) {
            return Err(StoreError::Duplicate);
        }
        state.refresh_tokens.insert(token.jti, token.into());
        Ok(())
    }

    async fn revoke_by_jti(&self, jti: Uuid) -> StoreResult<()> {
        let mut state = self.lock();
        let record = state
            .refresh_tokens
            .get_mut(&jti)
            .ok_or(StoreError::NotFound)?;
        record.revoked = true;
        Ok(())
    }

    async fn revoke_all_by_user(&self, user_id: i64) -> StoreResult<u64> {
        let mut state = self.lock();
        let mut revoked = 0;
        for record in state.refresh_tokens.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn find_by_jti(&self, jti: Uuid) -> StoreResult<RefreshTokenRecord> {
        self.lock()
            .refresh_tokens
            .get(&jti)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn rotate(
        &self,
        old_jti: Uuid,
        replacement: NewRefreshToken,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.lock();
        if state.refresh_tokens.contains_key(&replacement.jti) {
            return Err(StoreError::Duplicate);
        }
        match state.refresh_tokens.get_mut(&old_jti) {
            Some(record) if record.is_live(now) => record.revoked = true,
            _ => return Ok(false),
        }
        state
            .refresh_tokens
            .insert(replacement.jti, replacement.into());
        Ok(true)
    }
}
