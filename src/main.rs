use std::{net::SocketAddr, sync::Arc};

use session_auth::{
    config::AppConfig, db::connection, logging::init_tracing, routes, services::ServiceContext,
    state::AppState,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("server failed: {err:?}");
        eprintln!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env()?;
    init_tracing(&cfg.logging);

    let services = match &cfg.database {
        Some(db_cfg) => {
            let db = connection::connect(db_cfg).await?;
            ServiceContext::new(&db)
        }
        None => {
            tracing::warn!("no database configured; users and sessions live in memory only");
            ServiceContext::in_memory()
        }
    };

    let sessions = services.session(&cfg.auth)?;
    if let Some((username, password)) = cfg.auth.admin_credentials() {
        sessions.seed_admin(username, password).await?;
    }

    let addr: SocketAddr = format!("{}:{}", cfg.general.host, cfg.general.port).parse()?;
    let state = AppState::new(cfg, sessions);

    let app = routes::app(Arc::clone(&state));

    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
