//! Storage port for archived records.

use async_trait::async_trait;

use crate::Error;
use crate::record::{ArchivedRecord, RecordId};
use crate::timestamp::ArchiveTimestamp;

/// Durable record storage, addressable by id and by `(url, timestamp)`.
///
/// Implementations must be safe to call from many tasks at once; every
/// operation is atomic for the single record it touches.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exact-match lookup on the natural key.
    async fn find_by_url_and_timestamp(
        &self, url: &str, timestamp: ArchiveTimestamp,
    ) -> Result<Option<ArchivedRecord>, Error>;

    async fn find_by_id(&self, id: RecordId) -> Result<Option<ArchivedRecord>, Error>;

    /// Persist a new record and return it with its freshly assigned id.
    ///
    /// Any id already set on `record` is ignored. Fails with
    /// [`Error::Conflict`] when the natural key is taken.
    async fn insert(&self, record: &ArchivedRecord) -> Result<ArchivedRecord, Error>;

    /// Replace the stored fields of `id` with those of `record`.
    ///
    /// Fails with [`Error::NotFound`] when no such record exists.
    async fn update(&self, id: RecordId, record: &ArchivedRecord) -> Result<(), Error>;

    /// Fails with [`Error::NotFound`] when no such record exists.
    async fn delete(&self, id: RecordId) -> Result<(), Error>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64, Error>;
}
