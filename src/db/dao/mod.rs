pub mod base;
mod context;
pub mod error;
pub mod refresh_token_dao;
pub mod user_dao;

pub use base::DaoBase;
pub use context::DaoContext;
pub use error::store_err;
pub use refresh_token_dao::RefreshTokenDao;
pub use user_dao::UserDao;
