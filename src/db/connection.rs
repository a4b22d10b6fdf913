use std::time::Duration;

use anyhow::Context;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use tracing::info;

use crate::config::DatabaseConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the pool and brings `users` / `refresh_tokens` up to date with the
/// entity definitions.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(cfg.url.clone());
    options
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_idle)
        .connect_timeout(CONNECT_TIMEOUT)
        .acquire_timeout(CONNECT_TIMEOUT)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .context("cannot connect to the session database")?;
    info!(backend = ?db.get_database_backend(), "connected; syncing session schema");

    db.get_schema_registry("session_auth::db::entities::*")
        .sync(&db)
        .await
        .context("session schema sync failed")?;
    Ok(db)
}
