use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::{AuthError, store::User};

const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Claim set of an access token. Downstream verifiers depend on these names.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub iss: String,
    pub sub: String, // user id, decimal
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Clone)]
pub struct JwtKeys {
    pub enc: EncodingKey,
    pub dec: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("access token signing secret is not configured")]
    MissingSecret,
}

/// Stateless HS256 signer for access tokens.
#[derive(Clone)]
pub struct TokenSigner {
    keys: JwtKeys,
    issuer: String,
    access_ttl: Duration,
}

impl TokenSigner {
    /// A zero `access_ttl` falls back to 15 minutes.
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        access_ttl: Duration,
    ) -> Result<Self, SignerError> {
        if secret.trim().is_empty() {
            return Err(SignerError::MissingSecret);
        }

        Ok(Self {
            keys: JwtKeys::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            access_ttl: if access_ttl.is_zero() {
                DEFAULT_ACCESS_TTL
            } else {
                access_ttl
            },
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn make_access_claims(&self, user: &User, now: DateTime<Utc>) -> AccessClaims {
        let iat = now.timestamp();
        let ttl = i64::try_from(self.access_ttl.as_secs()).unwrap_or(i64::MAX);
        AccessClaims {
            iss: self.issuer.clone(),
            sub: user.id.to_string(),
            name: user.username.clone(),
            iat,
            exp: iat.saturating_add(ttl),
        }
    }

    pub fn sign_access(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = self.make_access_claims(user, now);
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".into());

        encode(&header, &claims, &self.keys.enc)
            .map_err(|err| AuthError::internal(format!("token encoding failed: {err}")))
    }

    /// Checks signature and issuer, then expiry against `now` rather than
    /// the system clock.
    pub fn verify_access(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let claims = decode::<AccessClaims>(token, &self.keys.dec, &validation)
            .map_err(|err| {
                tracing::debug!(error = %err, "access token rejected");
                AuthError::InvalidToken
            })?
            .claims;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid")
    }

    fn user() -> User {
        User {
            id: 42,
            username: "alice".to_string(),
            last_login_at: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(secret, "auth.test", Duration::from_secs(900))
            .expect("signer should build")
    }

    #[test]
    fn makes_claims_with_expected_subject_name_and_ttl() {
        let claims = signer("unit-test-secret").make_access_claims(&user(), ts());

        assert_eq!(claims.iss, "auth.test");
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.iat, ts().timestamp());
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn zero_ttl_falls_back_to_fifteen_minutes() {
        let signer = TokenSigner::new("unit-test-secret", "auth.test", Duration::ZERO)
            .expect("signer should build");

        assert_eq!(signer.access_ttl(), Duration::from_secs(900));
        let claims = signer.make_access_claims(&user(), ts());
        assert_eq!(claims.exp - claims.iat, 900);
        let token = signer.sign_access(&user(), ts()).expect("token should sign");
        signer
            .verify_access(&token, ts())
            .expect("token should not be born expired");
    }

    #[test]
    fn oversized_ttl_saturates_expiry() {
        let signer = TokenSigner::new("unit-test-secret", "auth.test", Duration::MAX)
            .expect("signer should build");

        let claims = signer.make_access_claims(&user(), ts());

        assert_eq!(claims.exp, i64::MAX);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn signed_token_decodes_with_the_same_secret() {
        let signer = signer("unit-test-secret");
        let token = signer.sign_access(&user(), ts()).expect("token should sign");

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let decoded = decode::<AccessClaims>(
            &token,
            &JwtKeys::from_secret(b"unit-test-secret").dec,
            &validation,
        )
        .expect("token should decode");

        assert_eq!(decoded.claims, signer.make_access_claims(&user(), ts()));
    }

    #[test]
    fn verify_accepts_fresh_token_and_rejects_expired_one() {
        let signer = signer("unit-test-secret");
        let token = signer.sign_access(&user(), ts()).expect("token should sign");

        let claims = signer
            .verify_access(&token, ts() + chrono::Duration::seconds(60))
            .expect("fresh token should verify");
        assert_eq!(claims.sub, "42");

        let err = signer
            .verify_access(&token, ts() + chrono::Duration::seconds(900))
            .expect_err("expired token should fail");
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn verify_rejects_token_signed_with_different_secret() {
        let token = signer("secret-a")
            .sign_access(&user(), ts())
            .expect("token should sign");

        let err = signer("secret-b")
            .verify_access(&token, ts())
            .expect_err("verify should fail");
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn verify_rejects_foreign_issuer() {
        let other = TokenSigner::new("unit-test-secret", "someone.else", Duration::from_secs(900))
            .expect("signer should build");
        let token = other.sign_access(&user(), ts()).expect("token should sign");

        let err = signer("unit-test-secret")
            .verify_access(&token, ts())
            .expect_err("issuer mismatch should fail");
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = match TokenSigner::new("  ", "auth.test", Duration::from_secs(900)) {
            Ok(_) => panic!("empty secret should fail"),
            Err(err) => err,
        };
        assert_eq!(err, SignerError::MissingSecret);
    }
}
