use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::{RngCore, rngs::OsRng};

use crate::config::HashConfig;

const SALT_LEN: usize = 16;
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-users";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("malformed password hash: {0}")]
    MalformedHash(String),
    #[error("entropy source failure: {0}")]
    Entropy(String),
    #[error("invalid hash parameters: {0}")]
    Params(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Salted Argon2id hashing with PHC-encoded output.
///
/// New hashes use the configured cost; verification reads algorithm,
/// version and cost back out of the stored string, so hashes produced under
/// older parameters keep verifying after the defaults move.
#[derive(Clone)]
pub struct CredentialHasher {
    argon: Arc<Argon2<'static>>,
    decoy: Arc<str>,
}

impl CredentialHasher {
    pub fn new(cost: &HashConfig) -> Result<Self, HashError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|err| HashError::Params(err.to_string()))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy = hash_with(&argon, DECOY_PASSWORD)?;
        Ok(Self {
            argon: Arc::new(argon),
            decoy: decoy.into(),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        hash_with(&self.argon, password)
    }

    /// Constant-time digest comparison; `Ok(false)` on mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        let parsed =
            PasswordHash::new(hash).map_err(|err| HashError::MalformedHash(err.to_string()))?;

        match self.argon.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(HashError::MalformedHash(err.to_string())),
        }
    }

    /// Burns one verification against a throwaway hash so that an unknown
    /// username costs the same as a wrong password.
    pub fn verify_decoy(&self, password: &str) {
        let _ = self.verify(password, &self.decoy);
    }
}

fn hash_with(argon: &Argon2<'_>, password: &str) -> Result<String, HashError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|err| HashError::Entropy(err.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|err| HashError::Hashing(err.to_string()))?;

    let hash = argon
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| HashError::Hashing(err.to_string()))?
        .to_string();
    Ok(hash)
}
