use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use uuid::Uuid;

use super::AuthError;

pub const REFRESH_SECRET_BYTES: usize = 32;

/// Source of the random bytes behind refresh secrets and token identifiers.
pub trait SecretSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), String>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl SecretSource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), String> {
        OsRng.try_fill_bytes(dest).map_err(|err| err.to_string())
    }
}

/// 32 random bytes, base64url without padding.
pub fn new_refresh_secret(source: &dyn SecretSource) -> Result<String, AuthError> {
    let mut buf = [0u8; REFRESH_SECRET_BYTES];
    source.fill(&mut buf).map_err(entropy_failure)?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// Random 128-bit identifier, laid out as a v4 UUID.
pub fn new_jti(source: &dyn SecretSource) -> Result<Uuid, AuthError> {
    let mut buf = [0u8; 16];
    source.fill(&mut buf).map_err(entropy_failure)?;
    Ok(uuid::Builder::from_random_bytes(buf).into_uuid())
}

fn entropy_failure(reason: String) -> AuthError {
    tracing::error!(%reason, "secure random source failed");
    AuthError::internal("secure random source unavailable")
}
