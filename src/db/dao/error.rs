use sea_orm::{DbErr, SqlErr};

use crate::auth::store::StoreError;

/// Unique violations become `Duplicate`; everything else is a backend
/// failure whose detail stays in the logs.
pub fn store_err(err: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
        return StoreError::Duplicate;
    }

    tracing::error!(error = %err, "database operation failed");
    StoreError::Backend("database operation failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_db_errors_become_backend_failures() {
        let err = store_err(DbErr::Custom("connection reset".to_string()));

        assert_eq!(
            err,
            StoreError::Backend("database operation failed".to_string())
        );
    }
}
