use super::{password::HashError, store::StoreError};

/// Failure kinds surfaced by the session core.
///
/// `InvalidCredentials` deliberately covers both "no such user" and "wrong
/// password"; callers must not be able to tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid refresh token")]
    InvalidToken,
    #[error("username already exists")]
    DuplicateUsername,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    InvalidInput(String),
    #[error("request canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Context lifecycle outcomes, as opposed to business failures.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Duplicate => AuthError::DuplicateUsername,
            StoreError::Detached => AuthError::internal("storage is not wired up"),
            StoreError::Backend(message) => AuthError::Internal(message),
        }
    }
}

impl From<HashError> for AuthError {
    fn from(err: HashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_typed_kinds() {
        assert_eq!(AuthError::from(StoreError::NotFound), AuthError::NotFound);
        assert_eq!(
            AuthError::from(StoreError::Duplicate),
            AuthError::DuplicateUsername
        );
        assert!(matches!(
            AuthError::from(StoreError::Backend("io".to_string())),
            AuthError::Internal(message) if message == "io"
        ));
        assert!(matches!(
            AuthError::from(StoreError::Detached),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn context_errors_are_distinct_from_business_failures() {
        assert!(AuthError::Canceled.is_context_error());
        assert!(AuthError::DeadlineExceeded.is_context_error());
        assert!(!AuthError::InvalidToken.is_context_error());
        assert!(!AuthError::internal("boom").is_context_error());
    }
}
