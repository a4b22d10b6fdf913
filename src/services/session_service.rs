//! Login, refresh-token rotation, logout and user provisioning.
//!
//! The service owns no mutable state of its own. Everything shared lives
//! behind the injected stores, so correctness under concurrent refreshes
//! rests on [`RefreshTokenStore::rotate`] being atomic.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{
    AccessClaims, AuthError, AuthResult, CredentialHasher, DeviceContext, RefreshToken,
    RefreshTokenStore, RequestContext, SecurityEvent, SecurityLog, TokenSigner, User,
    UserRepository,
    audit::TracingSecurityLog,
    clock::{Clock, SystemClock},
    entropy::{OsEntropy, SecretSource, new_jti, new_refresh_secret},
    store::{NewRefreshToken, NewUser, RefreshTokenRecord, StoreError, StoreResult},
};

pub const TOKEN_TYPE: &str = "Bearer";
pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 64;

const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Access and refresh credentials handed back on login and refresh.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    hasher: CredentialHasher,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn SecretSource>,
    security: Arc<dyn SecurityLog>,
    refresh_ttl: chrono::Duration,
    min_password_length: usize,
}

pub struct SessionServiceBuilder {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    hasher: CredentialHasher,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn SecretSource>,
    security: Arc<dyn SecurityLog>,
    refresh_ttl: Duration,
    min_password_length: usize,
}

impl SessionServiceBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn entropy(mut self, entropy: Arc<dyn SecretSource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn security_log(mut self, security: Arc<dyn SecurityLog>) -> Self {
        self.security = security;
        self
    }

    /// A zero duration keeps the 30 day default.
    pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.refresh_ttl = ttl;
        }
        self
    }

    pub fn min_password_length(mut self, min: usize) -> Self {
        self.min_password_length = min.max(1);
        self
    }

    pub fn build(self) -> AuthResult<SessionService> {
        let refresh_ttl = chrono::Duration::from_std(self.refresh_ttl)
            .map_err(|_| AuthError::invalid_input("refresh ttl is out of range"))?;

        Ok(SessionService {
            users: self.users,
            refresh_tokens: self.refresh_tokens,
            hasher: self.hasher,
            signer: self.signer,
            clock: self.clock,
            entropy: self.entropy,
            security: self.security,
            refresh_ttl,
            min_password_length: self.min_password_length,
        })
    }
}

impl SessionService {
    /// Starts a builder with the system clock, OS entropy and tracing-backed
    /// security log.
    pub fn builder(
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        hasher: CredentialHasher,
        signer: TokenSigner,
    ) -> SessionServiceBuilder {
        SessionServiceBuilder {
            users,
            refresh_tokens,
            hasher,
            signer,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            security: Arc::new(TracingSecurityLog),
            refresh_ttl: DEFAULT_REFRESH_TTL,
            min_password_length: 1,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Checks an access token against the injected clock.
    pub fn verify_access(&self, token: &str) -> AuthResult<AccessClaims> {
        self.signer.verify_access(token, self.clock.now())
    }

    pub async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
        device: DeviceContext,
    ) -> AuthResult<Session> {
        let now = self.clock.now();
        let Some(record) = ctx.run(self.users.find_by_username(username)).await? else {
            // same Argon2 work as a wrong password
            self.hasher.verify_decoy(password);
            self.security.record(SecurityEvent::LoginFailed {
                username: username.trim().to_string(),
                device,
            });
            return Err(AuthError::InvalidCredentials);
        };

        match self.hasher.verify(password, &record.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                self.security.record(SecurityEvent::LoginFailed {
                    username: username.trim().to_string(),
                    device,
                });
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => {
                tracing::error!(user_id = record.id, error = %err, "stored password hash is unreadable");
                self.security
                    .record(SecurityEvent::MalformedPasswordHash { user_id: record.id });
                return Err(AuthError::InvalidCredentials);
            }
        }

        match store_call(ctx, self.users.set_last_login(record.id, now)).await? {
            Ok(()) => {}
            // removed between lookup and stamp
            Err(StoreError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(err) => return Err(err.into()),
        }

        let mut user = User::from(record);
        user.last_login_at = Some(now);
        user.updated_at = now;

        let tokens = self.issue_tokens(ctx, &user, &device, now).await?;
        self.security.record(SecurityEvent::LoginSucceeded {
            user_id: user.id,
            device,
        });
        Ok(Session { user, tokens })
    }

    /// Exchanges a live refresh token for a new pair, revoking the old one.
    ///
    /// Presenting a revoked or expired token revokes every session of its
    /// owner before failing.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        presented: &str,
        device: DeviceContext,
    ) -> AuthResult<Session> {
        let token: RefreshToken = presented.parse()?;
        let now = self.clock.now();

        let Some(record) = self.find_refresh_record(ctx, token.jti).await? else {
            return Err(AuthError::InvalidToken);
        };

        if !record.is_live(now) {
            return Err(self.reuse_detected(ctx, &record, &device).await);
        }

        if !self.refresh_secret_matches(&token, &record, &device) {
            return Err(AuthError::InvalidToken);
        }

        let user: User = ctx
            .run(self.users.find_by_id(record.user_id))
            .await?
            .ok_or(AuthError::InvalidToken)?
            .into();

        // everything is minted up front so the old jti is retired and its
        // replacement stored in a single store call
        let (replacement, tokens) = self.mint_tokens(&user, &device, now)?;
        let new_jti = replacement.jti;
        if !ctx
            .run(self.refresh_tokens.rotate(record.jti, replacement, now))
            .await?
        {
            // a concurrent refresh already consumed this jti
            return Err(self.reuse_detected(ctx, &record, &device).await);
        }

        self.security.record(SecurityEvent::RefreshRotated {
            user_id: user.id,
            old_jti: record.jti,
            new_jti,
            device,
        });
        Ok(Session { user, tokens })
    }

    /// Revokes one refresh token. Unknown or already dead tokens succeed.
    pub async fn logout(
        &self,
        ctx: &RequestContext,
        presented: &str,
        device: DeviceContext,
    ) -> AuthResult<()> {
        let token: RefreshToken = presented.parse()?;
        let now = self.clock.now();

        let Some(record) = self.find_refresh_record(ctx, token.jti).await? else {
            return Ok(());
        };
        if !record.is_live(now) {
            return Ok(());
        }
        if !self.refresh_secret_matches(&token, &record, &device) {
            return Err(AuthError::InvalidToken);
        }

        match store_call(ctx, self.refresh_tokens.revoke_by_jti(record.jti)).await? {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Revokes every live refresh token of `user_id`; returns how many.
    pub async fn logout_all(&self, ctx: &RequestContext, user_id: i64) -> AuthResult<u64> {
        let count = ctx
            .run(self.refresh_tokens.revoke_all_by_user(user_id))
            .await?;
        self.security
            .record(SecurityEvent::SessionsRevoked { user_id, count });
        Ok(count)
    }

    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> AuthResult<User> {
        let username = username.trim();
        let chars = username.chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&chars) {
            return Err(AuthError::invalid_input(format!(
                "username must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"
            )));
        }
        if password.is_empty() {
            return Err(AuthError::invalid_input("password must not be empty"));
        }
        if password.chars().count() < self.min_password_length {
            return Err(AuthError::invalid_input(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }

        let password_hash = self.hasher.hash(password)?;
        let record = ctx
            .run(self.users.add(NewUser {
                username: username.to_string(),
                password_hash,
                created_at: self.clock.now(),
            }))
            .await?;
        tracing::info!(user_id = record.id, username = %record.username, "user created");
        Ok(record.into())
    }

    /// Removes the user and revokes whatever refresh tokens they still hold.
    pub async fn delete_user(&self, ctx: &RequestContext, id: i64) -> AuthResult<()> {
        match store_call(ctx, self.refresh_tokens.revoke_all_by_user(id)).await? {
            Ok(count) if count > 0 => self
                .security
                .record(SecurityEvent::SessionsRevoked { user_id: id, count }),
            Ok(_) | Err(StoreError::Detached) => {}
            Err(err) => return Err(err.into()),
        }

        ctx.run(self.users.delete(id)).await?;
        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Creates the configured admin account unless the name is taken.
    pub async fn seed_admin(&self, username: &str, password: &str) -> anyhow::Result<()> {
        let ctx = RequestContext::background();
        match self.create_user(&ctx, username, password).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "seeded admin user {}", user.username);
                Ok(())
            }
            Err(AuthError::DuplicateUsername) => {
                tracing::info!("admin user already present: {}", username.trim());
                Ok(())
            }
            Err(err) => Err(anyhow::anyhow!("admin seed failed: {err}")),
        }
    }

    /// Signs the access token and draws a fresh refresh jti and secret.
    /// Nothing is persisted.
    fn mint_tokens(
        &self,
        user: &User,
        device: &DeviceContext,
        now: DateTime<Utc>,
    ) -> AuthResult<(NewRefreshToken, TokenPair)> {
        let access = self.signer.sign_access(user, now)?;
        let secret = new_refresh_secret(self.entropy.as_ref())?;
        let jti = new_jti(self.entropy.as_ref())?;
        let secret_hash = self.hasher.hash(&secret)?;

        let record = NewRefreshToken {
            jti,
            user_id: user.id,
            secret_hash,
            user_agent: device.user_agent.clone(),
            ip: device.ip.clone(),
            expires_at: now + self.refresh_ttl,
            created_at: now,
        };
        let tokens = TokenPair {
            access,
            refresh: RefreshToken::new(jti, secret).to_string(),
            token_type: TOKEN_TYPE,
            expires_in: self.signer.access_ttl().as_secs(),
        };
        Ok((record, tokens))
    }

    async fn issue_tokens(
        &self,
        ctx: &RequestContext,
        user: &User,
        device: &DeviceContext,
        now: DateTime<Utc>,
    ) -> AuthResult<TokenPair> {
        let (record, tokens) = self.mint_tokens(user, device, now)?;
        let jti = record.jti;

        match store_call(ctx, self.refresh_tokens.create(record)).await? {
            Ok(()) => {}
            Err(StoreError::Detached) => {
                tracing::warn!(
                    user_id = user.id,
                    %jti,
                    "refresh store is detached; issued refresh token has no durable record"
                );
                self.security.record(SecurityEvent::RefreshStoreDetached {
                    user_id: user.id,
                    jti,
                });
            }
            Err(err) => return Err(err.into()),
        }
        Ok(tokens)
    }

    async fn find_refresh_record(
        &self,
        ctx: &RequestContext,
        jti: Uuid,
    ) -> AuthResult<Option<RefreshTokenRecord>> {
        match store_call(ctx, self.refresh_tokens.find_by_jti(jti)).await? {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::NotFound) => Ok(None),
            Err(StoreError::Detached) => {
                tracing::warn!(%jti, "refresh store is detached; token cannot be resolved");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn refresh_secret_matches(
        &self,
        token: &RefreshToken,
        record: &RefreshTokenRecord,
        device: &DeviceContext,
    ) -> bool {
        match self.hasher.verify(&token.secret, &record.secret_hash) {
            Ok(true) => true,
            Ok(false) => {
                self.security.record(SecurityEvent::RefreshSecretMismatch {
                    user_id: record.user_id,
                    jti: record.jti,
                    device: device.clone(),
                });
                false
            }
            Err(err) => {
                tracing::error!(jti = %record.jti, error = %err, "stored refresh hash is unreadable");
                false
            }
        }
    }

    async fn reuse_detected(
        &self,
        ctx: &RequestContext,
        record: &RefreshTokenRecord,
        device: &DeviceContext,
    ) -> AuthError {
        match ctx
            .run(self.refresh_tokens.revoke_all_by_user(record.user_id))
            .await
        {
            Ok(sessions_revoked) => {
                self.security.record(SecurityEvent::RefreshReuseDetected {
                    user_id: record.user_id,
                    jti: record.jti,
                    device: device.clone(),
                    sessions_revoked,
                });
                AuthError::InvalidToken
            }
            Err(err) => {
                tracing::error!(
                    user_id = record.user_id,
                    jti = %record.jti,
                    error = %err,
                    "failed to revoke sessions after refresh token reuse"
                );
                err
            }
        }
    }
}

/// Runs a store call under `ctx` but leaves the `StoreError` untouched, for
/// callers that branch on specific store outcomes.
async fn store_call<T, F>(ctx: &RequestContext, fut: F) -> AuthResult<StoreResult<T>>
where
    F: Future<Output = StoreResult<T>>,
{
    ctx.run(async { Ok::<_, AuthError>(fut.await) }).await
}
