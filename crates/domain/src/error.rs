//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into these via
//! `#[from]` or explicit `From` impls. Store adapters classify every failure
//! into a [`StoreError`] kind so the application can tell "the record is not
//! there" apart from "the store could not answer".

/// Boxed error used to carry adapter-specific causes through the domain.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error returned by application use-cases.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The backing store failed in a way the use-case could not recover from.
    #[error("store error")]
    Store(#[from] StoreError),

    /// Every attempt lost the race against a concurrent writer.
    #[error("counter contention: gave up after {attempts} attempts")]
    Contention { attempts: u32 },
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("partition key must not be empty")]
    EmptyPartitionKey,

    #[error("row key must not be empty")]
    EmptyRowKey,

    #[error("key contains forbidden character {0:?}")]
    ForbiddenKeyCharacter(char),

    #[error("counter would overflow")]
    CountOverflow,
}

/// Failure kinds reported by a counter table.
///
/// The first three kinds describe the state of the record and are recovered
/// by the application. The rest are infrastructure failures and always
/// propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The record does not exist.
    #[error("record not found")]
    NotFound,

    /// A create collided with a record that already exists.
    #[error("record already exists")]
    AlreadyExists,

    /// The concurrency token no longer matches the stored record.
    #[error("concurrency token mismatch")]
    Conflict,

    /// The store rejected our credentials.
    #[error("store rejected the credentials")]
    Unauthorized(#[source] BoxError),

    /// The store could not be reached (connect failure, timeout, ...).
    #[error("store unreachable")]
    Unreachable(#[source] BoxError),

    /// Any other store failure.
    #[error("store failure")]
    Other(#[source] BoxError),
}

impl StoreError {
    /// Whether this error means a concurrent writer changed the record
    /// between our read and our write, so the whole sequence may be retried.
    #[must_use]
    pub fn is_write_collision(&self) -> bool {
        matches!(self, Self::NotFound | Self::AlreadyExists | Self::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_record_state_errors_as_collisions() {
        assert!(StoreError::NotFound.is_write_collision());
        assert!(StoreError::AlreadyExists.is_write_collision());
        assert!(StoreError::Conflict.is_write_collision());
    }

    #[test]
    fn should_not_classify_infrastructure_errors_as_collisions() {
        let unauthorized = StoreError::Unauthorized("bad signature".into());
        let unreachable = StoreError::Unreachable("connection refused".into());
        let other = StoreError::Other("teapot".into());

        assert!(!unauthorized.is_write_collision());
        assert!(!unreachable.is_write_collision());
        assert!(!other.is_write_collision());
    }

    #[test]
    fn should_keep_source_when_wrapping_store_error() {
        let err = TallyError::from(StoreError::Unreachable("connection refused".into()));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "store unreachable");
    }

    #[test]
    fn should_mention_attempts_in_contention_message() {
        let err = TallyError::Contention { attempts: 3 };
        assert_eq!(err.to_string(), "counter contention: gave up after 3 attempts");
    }
}
