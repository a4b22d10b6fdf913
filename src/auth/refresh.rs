use std::{fmt, str::FromStr};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use uuid::Uuid;

use super::{AuthError, entropy::REFRESH_SECRET_BYTES};

/// Refresh token as handed to clients: `<jti hex>.<base64url secret>`.
///
/// The jti is the lookup key; only a hash of the secret is ever stored.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub jti: Uuid,
    pub secret: String,
}

impl RefreshToken {
    pub fn new(jti: Uuid, secret: String) -> Self {
        Self { jti, secret }
    }
}

impl fmt::Display for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.jti.simple(), self.secret)
    }
}

// The secret must never end up in logs through `{:?}`.
impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("jti", &self.jti)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl FromStr for RefreshToken {
    type Err = AuthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (jti, secret) = raw.trim().split_once('.').ok_or(AuthError::InvalidToken)?;
        if jti.len() != 32 {
            return Err(AuthError::InvalidToken);
        }
        let jti = Uuid::try_parse(jti).map_err(|_| AuthError::InvalidToken)?;

        let decoded = URL_SAFE_NO_PAD
            .decode(secret)
            .map_err(|_| AuthError::InvalidToken)?;
        if decoded.len() != REFRESH_SECRET_BYTES {
            return Err(AuthError::InvalidToken);
        }

        Ok(Self {
            jti,
            secret: secret.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::entropy::{OsEntropy, new_jti, new_refresh_secret};

    use super::*;

    fn sample() -> RefreshToken {
        RefreshToken::new(
            new_jti(&OsEntropy).expect("jti should generate"),
            new_refresh_secret(&OsEntropy).expect("secret should generate"),
        )
    }

    #[test]
    fn formatted_token_parses_back() {
        let token = sample();
        let wire = token.to_string();

        assert_eq!(wire.len(), 32 + 1 + 43);
        assert_eq!(wire.parse::<RefreshToken>(), Ok(token));
    }

    #[test]
    fn rejects_malformed_tokens() {
        let token = sample();
        let cases = [
            String::new(),
            "no-separator".to_string(),
            format!("{}.{}", token.jti.hyphenated(), token.secret),
            format!("{}.{}", token.jti.simple(), "c2hvcnQ"),
            format!("{}.{}!", token.jti.simple(), token.secret),
            format!("zz{}.{}", &token.jti.simple().to_string()[2..], token.secret),
        ];

        for case in cases {
            assert_eq!(
                case.parse::<RefreshToken>(),
                Err(AuthError::InvalidToken),
                "accepted {case:?}"
            );
        }
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let token = sample();
        let debug = format!("{token:?}");

        assert!(!debug.contains(&token.secret));
        assert!(debug.contains("redacted"));
    }
}
