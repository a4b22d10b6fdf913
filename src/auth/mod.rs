pub mod audit;
pub mod clock;
pub mod context;
pub mod entropy;
mod error;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod store;

pub use audit::{DeviceContext, SecurityEvent, SecurityLog};
pub use context::RequestContext;
pub use error::{AuthError, AuthResult};
pub use jwt::{AccessClaims, TokenSigner};
pub use password::CredentialHasher;
pub use refresh::RefreshToken;
pub use store::{RefreshTokenStore, User, UserRepository};
