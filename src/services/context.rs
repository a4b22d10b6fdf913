use std::sync::Arc;

use anyhow::Context;
use sea_orm::DatabaseConnection;

use crate::{
    auth::{CredentialHasher, RefreshTokenStore, TokenSigner, UserRepository},
    config::AuthConfig,
    db::{DetachedRefreshStore, MemoryStore, dao::DaoContext},
    services::session_service::SessionService,
};

/// Store wiring for the session service.
#[derive(Clone)]
pub struct ServiceContext {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl ServiceContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        let daos = DaoContext::new(db);
        Self {
            users: Arc::new(daos.user()),
            refresh_tokens: Arc::new(daos.refresh_token()),
        }
    }

    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self {
            users: Arc::new(store.clone()),
            refresh_tokens: Arc::new(store),
        }
    }

    /// Swaps in [`DetachedRefreshStore`]; logins keep working but nothing
    /// they issue can be refreshed.
    pub fn detach_refresh_tokens(mut self) -> Self {
        self.refresh_tokens = Arc::new(DetachedRefreshStore);
        self
    }

    pub fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    pub fn refresh_tokens(&self) -> Arc<dyn RefreshTokenStore> {
        self.refresh_tokens.clone()
    }

    /// Any error here is a boot failure.
    pub fn session(&self, cfg: &AuthConfig) -> anyhow::Result<SessionService> {
        let hasher = CredentialHasher::new(&cfg.hash).context("invalid password hash cost")?;
        let signer = TokenSigner::new(&cfg.jwt_secret, cfg.issuer.clone(), cfg.access_ttl())
            .context("cannot build access token signer")?;

        let refresh_tokens = if cfg.persist_refresh_tokens {
            self.refresh_tokens()
        } else {
            tracing::warn!("refresh token persistence disabled; issued refresh tokens cannot be redeemed");
            Arc::new(DetachedRefreshStore)
        };

        SessionService::builder(self.users(), refresh_tokens, hasher, signer)
            .refresh_ttl(cfg.refresh_ttl())
            .min_password_length(cfg.min_password_length)
            .build()
            .map_err(|err| anyhow::anyhow!("cannot build session service: {err}"))
    }
}
