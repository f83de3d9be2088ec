//! Counter service — the increment use-case.

use tally_domain::counter::{CounterKey, CounterRecord};
use tally_domain::error::{StoreError, TallyError};

use crate::ports::CounterTable;

/// How many read-increment-write attempts a single increment may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Allow up to `max_attempts` attempts. Zero is treated as one.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn max_attempts(self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Outcome of one read-increment-write attempt that reached the write step.
enum Attempt {
    Written(u64),
    Collided(StoreError),
}

/// Application service incrementing a single counter record.
///
/// Holds no counter state: every call reads the record from the table,
/// writes the next value conditionally, and returns what it wrote.
pub struct CounterService<T> {
    table: T,
    key: CounterKey,
    retry: RetryPolicy,
}

impl<T: CounterTable> CounterService<T> {
    /// Create a service for the visitor counter backed by the given table.
    pub fn new(table: T) -> Self {
        Self::with_key(table, CounterKey::visitors())
    }

    /// Create a service for an arbitrary counter key.
    pub fn with_key(table: T, key: CounterKey) -> Self {
        Self {
            table,
            key,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The key every increment targets.
    pub fn key(&self) -> &CounterKey {
        &self.key
    }

    /// Increment the counter by exactly one and return the new value.
    ///
    /// A missing record is created with a count of 1. An existing record is
    /// merged conditionally on the concurrency token read with it. When a
    /// concurrent writer wins the race the whole sequence starts over, up to
    /// the configured number of attempts.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Store`] for any store failure other than a
    /// write collision (no record is created when the read fails),
    /// [`TallyError::Contention`] when every attempt collided, or
    /// [`TallyError::Validation`] when the count would overflow.
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub async fn increment(&self) -> Result<u64, TallyError> {
        let max_attempts = self.retry.max_attempts();
        for attempt in 1..=max_attempts {
            match self.attempt().await? {
                Attempt::Written(count) => {
                    tracing::debug!(attempt, count, "counter incremented");
                    return Ok(count);
                }
                Attempt::Collided(err) => {
                    tracing::debug!(attempt, %err, "concurrent write detected, retrying");
                }
            }
        }
        tracing::warn!(
            attempts = max_attempts,
            "giving up after repeated write collisions"
        );
        Err(TallyError::Contention {
            attempts: max_attempts,
        })
    }

    async fn attempt(&self) -> Result<Attempt, TallyError> {
        // Read failures propagate as-is: only `Ok(None)` leads to a create.
        let written = match self.table.get(self.key.clone()).await? {
            Some(stored) => {
                let next = stored.record.incremented()?;
                let count = next.count;
                self.table.merge(next, stored.etag).await.map(|_| count)
            }
            None => {
                let first = CounterRecord::first(self.key.clone());
                let count = first.count;
                self.table.create(first).await.map(|_| count)
            }
        };

        match written {
            Ok(count) => Ok(Attempt::Written(count)),
            Err(err) if err.is_write_collision() => Ok(Attempt::Collided(err)),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::collections::hash_map::Entry;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tally_domain::counter::{ETag, StoredCounter};
    use tally_domain::error::ValidationError;

    #[derive(Default)]
    struct Inner {
        rows: Mutex<HashMap<CounterKey, (u64, u64)>>,
        keys_seen: Mutex<Vec<CounterKey>>,
        creates: AtomicUsize,
        merges: AtomicUsize,
        failing_gets: AtomicUsize,
        unauthorized: AtomicBool,
        always_conflict: AtomicBool,
        steal_next_create: AtomicBool,
        yielding: bool,
    }

    /// Table with versioned rows; optionally yields at every call so that
    /// concurrent increments interleave.
    #[derive(Clone, Default)]
    struct InMemoryTable {
        inner: Arc<Inner>,
    }

    impl InMemoryTable {
        fn yielding() -> Self {
            Self {
                inner: Arc::new(Inner {
                    yielding: true,
                    ..Inner::default()
                }),
            }
        }

        fn seed(&self, key: CounterKey, count: u64) {
            self.inner.rows.lock().unwrap().insert(key, (count, 1));
        }

        fn count(&self, key: &CounterKey) -> Option<u64> {
            self.inner.rows.lock().unwrap().get(key).map(|row| row.0)
        }

        fn creates(&self) -> usize {
            self.inner.creates.load(Ordering::SeqCst)
        }

        fn merges(&self) -> usize {
            self.inner.merges.load(Ordering::SeqCst)
        }

        async fn pause(&self) {
            if self.inner.yielding {
                tokio::task::yield_now().await;
            }
        }
    }

    impl CounterTable for InMemoryTable {
        fn get(
            &self,
            key: CounterKey,
        ) -> impl Future<Output = Result<Option<StoredCounter>, StoreError>> + Send {
            async move {
                self.pause().await;
                self.inner.keys_seen.lock().unwrap().push(key.clone());
                if self.inner.unauthorized.load(Ordering::SeqCst) {
                    return Err(StoreError::Unauthorized("signature mismatch".into()));
                }
                if self
                    .inner
                    .failing_gets
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return Err(StoreError::Unreachable("connection refused".into()));
                }
                let row = self.inner.rows.lock().unwrap().get(&key).copied();
                Ok(row.map(|(count, version)| StoredCounter {
                    record: CounterRecord { key, count },
                    etag: ETag::new(version.to_string()),
                }))
            }
        }

        fn create(
            &self,
            record: CounterRecord,
        ) -> impl Future<Output = Result<ETag, StoreError>> + Send {
            async move {
                self.pause().await;
                self.inner.creates.fetch_add(1, Ordering::SeqCst);
                let mut rows = self.inner.rows.lock().unwrap();
                if self.inner.steal_next_create.swap(false, Ordering::SeqCst) {
                    rows.insert(record.key.clone(), (1, 1));
                }
                match rows.entry(record.key) {
                    Entry::Occupied(_) => Err(StoreError::AlreadyExists),
                    Entry::Vacant(slot) => {
                        slot.insert((record.count, 1));
                        Ok(ETag::new("1"))
                    }
                }
            }
        }

        fn merge(
            &self,
            record: CounterRecord,
            etag: ETag,
        ) -> impl Future<Output = Result<ETag, StoreError>> + Send {
            async move {
                self.pause().await;
                self.inner.merges.fetch_add(1, Ordering::SeqCst);
                if self.inner.always_conflict.load(Ordering::SeqCst) {
                    return Err(StoreError::Conflict);
                }
                let mut rows = self.inner.rows.lock().unwrap();
                let Some(row) = rows.get_mut(&record.key) else {
                    return Err(StoreError::NotFound);
                };
                if row.1.to_string() != etag.as_str() {
                    return Err(StoreError::Conflict);
                }
                *row = (record.count, row.1 + 1);
                Ok(ETag::new(row.1.to_string()))
            }
        }
    }

    fn make_service() -> (CounterService<InMemoryTable>, InMemoryTable) {
        let table = InMemoryTable::default();
        (CounterService::new(table.clone()), table)
    }

    #[tokio::test]
    async fn should_create_record_with_one_when_store_is_empty() {
        let (svc, table) = make_service();

        let count = svc.increment().await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(table.count(&CounterKey::visitors()), Some(1));
        assert_eq!(table.creates(), 1);
        assert_eq!(table.merges(), 0);
    }

    #[tokio::test]
    async fn should_return_consecutive_counts_when_called_sequentially() {
        let (svc, table) = make_service();

        let mut counts = Vec::new();
        for _ in 0..5 {
            counts.push(svc.increment().await.unwrap());
        }

        assert_eq!(counts, vec![1, 2, 3, 4, 5]);
        assert_eq!(table.count(&CounterKey::visitors()), Some(5));
        assert_eq!(table.creates(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_not_lose_or_duplicate_counts_when_called_concurrently() {
        const CALLERS: u32 = 24;
        let table = InMemoryTable::yielding();
        let svc = Arc::new(
            CounterService::new(table.clone()).with_retry_policy(RetryPolicy::new(CALLERS)),
        );

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.increment().await })
            })
            .collect();

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap().unwrap());
        }
        counts.sort_unstable();

        let expected: Vec<u64> = (1..=u64::from(CALLERS)).collect();
        assert_eq!(counts, expected);
        assert_eq!(
            table.count(&CounterKey::visitors()),
            Some(u64::from(CALLERS))
        );
    }

    #[tokio::test]
    async fn should_always_target_the_visitor_key() {
        let (svc, table) = make_service();
        svc.increment().await.unwrap();
        svc.increment().await.unwrap();

        let seen = table.inner.keys_seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|key| *key == CounterKey::visitors()));
        assert_eq!(svc.key(), &CounterKey::visitors());
    }

    #[tokio::test]
    async fn should_not_create_when_read_is_unauthorized() {
        let (svc, table) = make_service();
        table.inner.unauthorized.store(true, Ordering::SeqCst);

        let result = svc.increment().await;

        assert!(matches!(
            result,
            Err(TallyError::Store(StoreError::Unauthorized(_)))
        ));
        assert_eq!(table.creates(), 0);
        assert_eq!(table.count(&CounterKey::visitors()), None);
    }

    #[tokio::test]
    async fn should_not_retry_when_store_is_unreachable() {
        let (svc, table) = make_service();
        table.seed(CounterKey::visitors(), 7);
        table.inner.failing_gets.store(1, Ordering::SeqCst);

        let result = svc.increment().await;

        assert!(matches!(
            result,
            Err(TallyError::Store(StoreError::Unreachable(_)))
        ));
        assert_eq!(table.creates(), 0);
        assert_eq!(table.merges(), 0);
        assert_eq!(table.count(&CounterKey::visitors()), Some(7));
    }

    #[tokio::test]
    async fn should_resume_counting_after_an_outage() {
        let (svc, table) = make_service();

        assert_eq!(svc.increment().await.unwrap(), 1);
        assert_eq!(svc.increment().await.unwrap(), 2);

        table.inner.failing_gets.store(1, Ordering::SeqCst);
        assert!(svc.increment().await.is_err());

        assert_eq!(svc.increment().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn should_give_up_after_max_attempts_when_every_merge_conflicts() {
        let (svc, table) = make_service();
        table.seed(CounterKey::visitors(), 10);
        table.inner.always_conflict.store(true, Ordering::SeqCst);

        let result = svc.increment().await;

        assert!(matches!(
            result,
            Err(TallyError::Contention { attempts: 3 })
        ));
        assert_eq!(table.merges(), 3);
        assert_eq!(table.count(&CounterKey::visitors()), Some(10));
    }

    #[tokio::test]
    async fn should_merge_when_another_writer_created_the_record_first() {
        let (svc, table) = make_service();
        table.inner.steal_next_create.store(true, Ordering::SeqCst);

        let count = svc.increment().await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(table.creates(), 1);
        assert_eq!(table.merges(), 1);
        assert_eq!(table.count(&CounterKey::visitors()), Some(2));
    }

    #[tokio::test]
    async fn should_fail_without_retry_when_count_would_overflow() {
        let (svc, table) = make_service();
        table.seed(CounterKey::visitors(), u64::MAX);

        let result = svc.increment().await;

        assert!(matches!(
            result,
            Err(TallyError::Validation(ValidationError::CountOverflow))
        ));
        assert_eq!(table.merges(), 0);
    }

    #[tokio::test]
    async fn should_increment_custom_key_when_configured() {
        let table = InMemoryTable::default();
        let key = CounterKey::new("counter", "downloads").unwrap();
        let svc = CounterService::with_key(table.clone(), key.clone());

        svc.increment().await.unwrap();

        assert_eq!(table.count(&key), Some(1));
        assert_eq!(table.count(&CounterKey::visitors()), None);
    }

    #[test]
    fn should_clamp_zero_attempts_to_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }
}
