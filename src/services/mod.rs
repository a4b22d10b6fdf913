pub mod context;
pub mod session_service;

pub use context::ServiceContext;
pub use session_service::{Session, SessionService, TokenPair};
