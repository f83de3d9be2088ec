//! Counter Record — a named, monotonically increasing count stored in a
//! key-value table under a composite key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TallyError, ValidationError};

/// Name of the table holding the visitor counter.
pub const VISITORS_TABLE: &str = "Visitors";

/// Partition key of the visitor counter.
pub const VISITORS_PARTITION_KEY: &str = "counter";

/// Row key of the visitor counter.
pub const VISITORS_ROW_KEY: &str = "visitors";

const FORBIDDEN_KEY_CHARS: [char; 4] = ['/', '\\', '#', '?'];

/// Composite identity of a counter record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub partition_key: String,
    pub row_key: String,
}

impl CounterKey {
    /// Build a key after checking the table key rules.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Validation`] when either part is empty or
    /// contains a forbidden character.
    pub fn new(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
    ) -> Result<Self, TallyError> {
        let key = Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        };
        key.validate()?;
        Ok(key)
    }

    /// The fixed key of the visitor counter: `("counter", "visitors")`.
    #[must_use]
    pub fn visitors() -> Self {
        Self {
            partition_key: VISITORS_PARTITION_KEY.to_string(),
            row_key: VISITORS_ROW_KEY.to_string(),
        }
    }

    /// Check the table key rules.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Validation`] when either part is empty or
    /// contains `/`, `\`, `#`, `?` or a control character.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.partition_key.is_empty() {
            return Err(ValidationError::EmptyPartitionKey.into());
        }
        if self.row_key.is_empty() {
            return Err(ValidationError::EmptyRowKey.into());
        }
        let forbidden = self
            .partition_key
            .chars()
            .chain(self.row_key.chars())
            .find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_control());
        if let Some(c) = forbidden {
            return Err(ValidationError::ForbiddenKeyCharacter(c).into());
        }
        Ok(())
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.row_key)
    }
}

/// Opaque concurrency token issued by the store on every successful write.
///
/// Only ever compared for equality by the store itself; the application
/// passes it back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag(String);

impl ETag {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted counter: identity plus current count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub key: CounterKey,
    pub count: u64,
}

impl CounterRecord {
    /// The record written on the first-ever increment.
    #[must_use]
    pub fn first(key: CounterKey) -> Self {
        Self { key, count: 1 }
    }

    /// A copy of this record with the count bumped by one.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CountOverflow`] at `u64::MAX`.
    pub fn incremented(&self) -> Result<Self, TallyError> {
        let count = self
            .count
            .checked_add(1)
            .ok_or(ValidationError::CountOverflow)?;
        Ok(Self {
            key: self.key.clone(),
            count,
        })
    }
}

/// A record as read from the store, together with its concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCounter {
    pub record: CounterRecord,
    pub etag: ETag,
}
