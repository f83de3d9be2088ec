//! `SQLite` implementation of [`CounterTable`].
//!
//! The concurrency token is a per-row `version` that every successful write
//! bumps; a merge only applies while the version still matches.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use tally_app::ports::CounterTable;
use tally_domain::counter::{CounterKey, CounterRecord, ETag, StoredCounter};
use tally_domain::error::StoreError;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(StoredCounter);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let partition_key: String = row.try_get("partition_key")?;
        let row_key: String = row.try_get("row_key")?;
        let count: i64 = row.try_get("count")?;
        let version: i64 = row.try_get("version")?;

        let count = u64::try_from(count)
            .map_err(|_| sqlx::Error::Decode(Box::new(StorageError::NegativeCount(count))))?;

        Ok(Self(StoredCounter {
            record: CounterRecord {
                key: CounterKey {
                    partition_key,
                    row_key,
                },
                count,
            },
            etag: ETag::new(version.to_string()),
        }))
    }
}

const INSERT: &str =
    "INSERT INTO counters (partition_key, row_key, count, version) VALUES (?, ?, ?, 1)";
const SELECT_BY_KEY: &str = "SELECT * FROM counters WHERE partition_key = ? AND row_key = ?";
const EXISTS_BY_KEY: &str =
    "SELECT EXISTS (SELECT 1 FROM counters WHERE partition_key = ? AND row_key = ?)";
const MERGE_IF_VERSION: &str = r"
    UPDATE counters
    SET count = ?, version = version + 1
    WHERE partition_key = ? AND row_key = ? AND version = ?
    RETURNING version
";

fn to_column(count: u64) -> Result<i64, StorageError> {
    i64::try_from(count).map_err(|_| StorageError::CountTooLarge(count))
}

/// `SQLite`-backed counter table.
pub struct SqliteCounterTable {
    pool: SqlitePool,
}

impl SqliteCounterTable {
    /// Create a new table using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CounterTable for SqliteCounterTable {
    fn get(
        &self,
        key: CounterKey,
    ) -> impl Future<Output = Result<Option<StoredCounter>, StoreError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_KEY)
                .bind(&key.partition_key)
                .bind(&key.row_key)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn create(
        &self,
        record: CounterRecord,
    ) -> impl Future<Output = Result<ETag, StoreError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(&record.key.partition_key)
                .bind(&record.key.row_key)
                .bind(to_column(record.count)?)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(ETag::new("1"))
        }
    }

    fn merge(
        &self,
        record: CounterRecord,
        etag: ETag,
    ) -> impl Future<Output = Result<ETag, StoreError>> + Send {
        let pool = self.pool.clone();
        async move {
            // A token we never issued cannot match any row.
            let Ok(expected) = etag.as_str().parse::<i64>() else {
                return Err(StoreError::Conflict);
            };

            let updated: Option<(i64,)> = sqlx::query_as(MERGE_IF_VERSION)
                .bind(to_column(record.count)?)
                .bind(&record.key.partition_key)
                .bind(&record.key.row_key)
                .bind(expected)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            if let Some((version,)) = updated {
                return Ok(ETag::new(version.to_string()));
            }

            let (exists,): (bool,) = sqlx::query_as(EXISTS_BY_KEY)
                .bind(&record.key.partition_key)
                .bind(&record.key.row_key)
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            if exists {
                Err(StoreError::Conflict)
            } else {
                Err(StoreError::NotFound)
            }
        }
    }
}
