//! Counter table port — the key-value store holding counter records.

use std::future::Future;

use tally_domain::counter::{CounterKey, CounterRecord, ETag, StoredCounter};
use tally_domain::error::StoreError;

/// A key-value table of [`CounterRecord`]s with optimistic concurrency.
///
/// Implementations must classify failures precisely: a missing record on
/// [`get`](Self::get) is `Ok(None)`, never an error, and infrastructure
/// failures must never be reported as [`StoreError::NotFound`].
pub trait CounterTable {
    /// Fetch a record and its current concurrency token.
    fn get(
        &self,
        key: CounterKey,
    ) -> impl Future<Output = Result<Option<StoredCounter>, StoreError>> + Send;

    /// Insert a record that must not exist yet.
    ///
    /// Fails with [`StoreError::AlreadyExists`] when another writer got there
    /// first.
    fn create(
        &self,
        record: CounterRecord,
    ) -> impl Future<Output = Result<ETag, StoreError>> + Send;

    /// Merge the record's `count` into the stored record, only if the stored
    /// concurrency token still equals `etag`.
    ///
    /// Fails with [`StoreError::Conflict`] on a token mismatch and with
    /// [`StoreError::NotFound`] when the record is gone.
    fn merge(
        &self,
        record: CounterRecord,
        etag: ETag,
    ) -> impl Future<Output = Result<ETag, StoreError>> + Send;
}
