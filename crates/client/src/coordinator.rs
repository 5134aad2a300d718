//! Request coordination between the record store and the archive fetcher.
//!
//! Every proxied request goes through [`Coordinator::submit`]:
//!
//! 1. Cache lookup by `(url, timestamp)`; a hit returns immediately.
//! 2. Join the in-flight fetch for the same key, or start one.
//! 3. The fetch waits for a slot on a FIFO semaphore, re-checks the cache,
//!    then calls the fetcher.
//! 4. Genuine captures are persisted once; misses and fetch failures become
//!    the empty 500 record and are never stored.
//!
//! Fetches run as detached tasks, so a client hanging up does not cancel a
//! fetch other callers are waiting on, and a finished fetch is still stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Semaphore;
use waybackproxy_core::{ArchiveTimestamp, ArchivedRecord, Error, RecordStore, TimestampCell};

use crate::fetch::{FetchOutcome, Fetcher};

type FlightResult = Result<ArchivedRecord, Arc<Error>>;
type Flight = Shared<BoxFuture<'static, FlightResult>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlightKey {
    url: String,
    timestamp: ArchiveTimestamp,
}

struct Inner {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn Fetcher>,
    permits: Semaphore,
    flights: Mutex<HashMap<FlightKey, Flight>>,
}

/// Cache-first entry point with single-flight fetches and a global fetch bound.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
    timestamp: TimestampCell,
}

impl Coordinator {
    /// Create a coordinator over the given store and fetcher.
    ///
    /// `max_concurrent_fetches` is clamped to at least one.
    pub fn new(
        store: Arc<dyn RecordStore>, fetcher: Arc<dyn Fetcher>, timestamp: TimestampCell, max_concurrent_fetches: usize,
    ) -> Self {
        let inner = Inner {
            store,
            fetcher,
            permits: Semaphore::new(max_concurrent_fetches.max(1)),
            flights: Mutex::new(HashMap::new()),
        };
        Self { inner: Arc::new(inner), timestamp }
    }

    /// Handle onto the active timestamp this coordinator reads.
    pub fn timestamp(&self) -> &TimestampCell {
        &self.timestamp
    }

    /// Number of distinct keys currently being fetched.
    pub fn in_flight_count(&self) -> usize {
        self.inner.flights.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Resolve `url` at the currently active timestamp.
    pub async fn submit(&self, url: &str) -> Result<ArchivedRecord, Error> {
        self.submit_at(url, self.timestamp.load()).await
    }

    /// Resolve `url` at an explicit timestamp.
    ///
    /// Only storage failures are returned as errors.
    pub async fn submit_at(&self, url: &str, timestamp: ArchiveTimestamp) -> Result<ArchivedRecord, Error> {
        if let Some(record) = self.inner.store.find_by_url_and_timestamp(url, timestamp).await? {
            tracing::debug!(url, %timestamp, "cache hit");
            return Ok(record);
        }

        let key = FlightKey { url: url.to_string(), timestamp };
        self.join_flight(key).await.map_err(Error::Shared)
    }

    fn join_flight(&self, key: FlightKey) -> Flight {
        let mut flights = self.inner.flights.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = flights.get(&key) {
            tracing::debug!(url = %key.url, timestamp = %key.timestamp, "joining in-flight fetch");
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let _guard = FlightGuard { inner: Arc::clone(&inner), key: task_key.clone() };
            inner.resolve(&task_key).await
        });

        let flight = async move {
            match handle.await {
                Ok(result) => result.map_err(Arc::new),
                Err(err) => Err(Arc::new(Error::Internal(format!("fetch task failed: {err}")))),
            }
        }
        .boxed()
        .shared();

        flights.insert(key, flight.clone());
        flight
    }
}

impl Inner {
    async fn resolve(&self, key: &FlightKey) -> Result<ArchivedRecord, Error> {
        let outcome = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| Error::Internal(format!("fetch slots closed: {e}")))?;

            // Another flight for this key may have stored it while we queued.
            if let Some(record) = self.store.find_by_url_and_timestamp(&key.url, key.timestamp).await? {
                return Ok(record);
            }

            self.fetcher.fetch(&key.url, key.timestamp).await
        };

        let record = match outcome {
            Ok(FetchOutcome::Archived(record)) => record,
            Ok(FetchOutcome::NotArchived(record)) => {
                tracing::info!(url = %key.url, timestamp = %key.timestamp, "not archived");
                return Ok(record);
            }
            Err(err) => {
                if err.is_fetch_error() {
                    tracing::warn!(url = %key.url, timestamp = %key.timestamp, error = %err, "archive fetch failed");
                } else {
                    tracing::error!(url = %key.url, timestamp = %key.timestamp, error = %err, "archive fetch failed");
                }
                return Ok(ArchivedRecord::unavailable(key.url.clone(), key.timestamp));
            }
        };

        match self.store.insert(&record).await {
            Ok(stored) => Ok(stored),
            Err(Error::Conflict { .. }) => self
                .store
                .find_by_url_and_timestamp(&key.url, key.timestamp)
                .await?
                .ok_or_else(|| Error::Internal(format!("record for {} vanished after conflict", key.url))),
            Err(err) => Err(err),
        }
    }
}

/// Removes a flight's key once its task finishes, including on panic.
struct FlightGuard {
    inner: Arc<Inner>,
    key: FlightKey,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inner.flights.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use waybackproxy_core::{CacheDb, RecordId};

    #[derive(Clone, Copy)]
    enum Mode {
        Archived,
        NotArchived,
        Failing,
    }

    struct StubFetcher {
        mode: Mode,
        delay: Duration,
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(mode: Mode, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                mode,
                delay,
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str, timestamp: ArchiveTimestamp) -> Result<FetchOutcome, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(url.to_string());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            match self.mode {
                Mode::Archived => {
                    let headers = BTreeMap::from([("content-type".to_string(), "text/html".to_string())]);
                    let body = format!("<p>{url}</p>").into_bytes();
                    Ok(FetchOutcome::Archived(ArchivedRecord::new(url, timestamp, 200, headers, body)))
                }
                Mode::NotArchived => Ok(FetchOutcome::NotArchived(ArchivedRecord::unavailable(url, timestamp))),
                Mode::Failing => Err(Error::FetchTimeout(url.to_string())),
            }
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        async fn find_by_url_and_timestamp(
            &self, _url: &str, _timestamp: ArchiveTimestamp,
        ) -> Result<Option<ArchivedRecord>, Error> {
            Ok(None)
        }

        async fn find_by_id(&self, _id: RecordId) -> Result<Option<ArchivedRecord>, Error> {
            Ok(None)
        }

        async fn insert(&self, _record: &ArchivedRecord) -> Result<ArchivedRecord, Error> {
            Err(Error::MigrationFailed("disk full".into()))
        }

        async fn update(&self, id: RecordId, _record: &ArchivedRecord) -> Result<(), Error> {
            Err(Error::NotFound(id))
        }

        async fn delete(&self, id: RecordId) -> Result<(), Error> {
            Err(Error::NotFound(id))
        }

        async fn count(&self) -> Result<u64, Error> {
            Ok(0)
        }
    }

    fn ts() -> ArchiveTimestamp {
        ArchiveTimestamp::parse("20010101000000").unwrap()
    }

    async fn setup(fetcher: Arc<StubFetcher>, max: usize) -> (Coordinator, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let coordinator = Coordinator::new(Arc::new(db.clone()), fetcher, TimestampCell::new(ts()), max);
        (coordinator, db)
    }

    #[tokio::test]
    async fn test_second_submit_is_served_from_cache() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::ZERO);
        let (coordinator, db) = setup(fetcher.clone(), 4).await;

        let first = coordinator.submit("http://example.com/").await.unwrap();
        let second = coordinator.submit("http://example.com/").await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert!(first.id.is_some());
        assert_eq!(first, second);
        assert_eq!(db.count_records().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fetch_concurrency_is_bounded() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::from_millis(50));
        let (coordinator, db) = setup(fetcher.clone(), 2).await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.submit(&format!("http://example.com/{i}")).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().status_code, 200);
        }

        assert_eq!(fetcher.calls(), 8);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
        assert_eq!(db.count_records().await.unwrap(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queued_fetches_run_in_submit_order() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::from_millis(50));
        let (coordinator, _db) = setup(fetcher.clone(), 1).await;

        let blocker = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.submit("http://example.com/blocker").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let urls: Vec<String> = (0..16).map(|i| format!("http://example.com/{i}")).collect();
        let mut tasks = Vec::new();
        for url in &urls {
            let coordinator = coordinator.clone();
            let url = url.clone();
            tasks.push(tokio::spawn(async move { coordinator.submit(&url).await }));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        blocker.await.unwrap().unwrap();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let seen = fetcher.seen.lock().unwrap().clone();
        assert_eq!(seen[0], "http://example.com/blocker");
        assert_eq!(&seen[1..], urls.as_slice());
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_share_one_fetch() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::from_millis(100));
        let (coordinator, db) = setup(fetcher.clone(), 4).await;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.submit("http://example.com/same").await })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().id);
        }

        assert_eq!(fetcher.calls(), 1);
        assert!(ids.iter().all(|id| id.is_some() && *id == ids[0]));
        assert_eq!(db.count_records().await.unwrap(), 1);
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_is_not_persisted() {
        let fetcher = StubFetcher::new(Mode::NotArchived, Duration::ZERO);
        let (coordinator, db) = setup(fetcher.clone(), 4).await;

        let record = coordinator.submit("http://example.com/nothing").await.unwrap();
        assert!(record.is_unavailable());
        assert!(record.id.is_none());
        assert_eq!(db.count_records().await.unwrap(), 0);

        coordinator.submit("http://example.com/nothing").await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_degrades_to_unavailable() {
        let fetcher = StubFetcher::new(Mode::Failing, Duration::ZERO);
        let (coordinator, db) = setup(fetcher.clone(), 4).await;

        let record = coordinator.submit("http://example.com/down").await.unwrap();

        assert_eq!(record.status_code, 500);
        assert!(record.body.is_empty());
        assert_eq!(record.url, "http://example.com/down");
        assert_eq!(record.timestamp, ts());
        assert_eq!(db.count_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_submit_still_persists() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::from_millis(200));
        let (coordinator, db) = setup(fetcher.clone(), 4).await;

        let result =
            tokio::time::timeout(Duration::from_millis(50), coordinator.submit("http://example.com/slow")).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(db.count_records().await.unwrap(), 1);
        assert_eq!(coordinator.in_flight_count(), 0);
        let record = coordinator.submit("http://example.com/slow").await.unwrap();
        assert_eq!(record.status_code, 200);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_timestamp_change_uses_new_key() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::ZERO);
        let (coordinator, db) = setup(fetcher.clone(), 4).await;

        let first = coordinator.submit("http://example.com/").await.unwrap();
        let later = ArchiveTimestamp::parse("20050505050505").unwrap();
        coordinator.timestamp().store(later);
        let second = coordinator.submit("http://example.com/").await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(first.timestamp, ts());
        assert_eq!(second.timestamp, later);
        assert_ne!(first.id, second.id);
        assert_eq!(db.count_records().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_submit_at_explicit_timestamp_leaves_cell_alone() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::ZERO);
        let (coordinator, _db) = setup(fetcher.clone(), 4).await;
        let other = ArchiveTimestamp::parse("19990101000000").unwrap();

        let record = coordinator.submit_at("http://example.com/", other).await.unwrap();

        assert_eq!(record.timestamp, other);
        assert_eq!(coordinator.timestamp().load(), ts());
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::ZERO);
        let coordinator = Coordinator::new(Arc::new(BrokenStore), fetcher, TimestampCell::new(ts()), 1);

        let result = coordinator.submit("http://example.com/").await;

        let err = result.unwrap_err();
        assert!(!err.is_fetch_error());
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_zero_bound_is_clamped() {
        let fetcher = StubFetcher::new(Mode::Archived, Duration::ZERO);
        let (coordinator, _db) = setup(fetcher.clone(), 0).await;

        let record = coordinator.submit("http://example.com/").await.unwrap();
        assert_eq!(record.status_code, 200);
    }
}
