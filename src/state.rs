use std::sync::Arc;

use crate::{auth::RequestContext, config::AppConfig, services::SessionService};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(config: AppConfig, sessions: SessionService) -> Arc<Self> {
        Arc::new(Self { config, sessions })
    }

    /// Fresh context carrying the configured per-request deadline.
    pub fn request_context(&self) -> RequestContext {
        match self.config.general.request_timeout() {
            Some(timeout) => RequestContext::with_timeout(timeout),
            None => RequestContext::background(),
        }
    }
}
