//! Storage-specific error type wrapping sqlx errors.

use tally_domain::error::StoreError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored count does not fit the domain type.
    #[error("stored count {0} is negative")]
    NegativeCount(i64),

    /// A count does not fit an `INTEGER` column.
    #[error("count {0} exceeds the INTEGER range")]
    CountTooLarge(u64),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Database(sqlx::Error::Database(ref db_err))
                if db_err.is_unique_violation() =>
            {
                Self::AlreadyExists
            }
            StorageError::Database(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            ) => Self::Unreachable(Box::new(err)),
            other => Self::Other(Box::new(other)),
        }
    }
}
