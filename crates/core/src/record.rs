//! The unit of cached content.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timestamp::ArchiveTimestamp;

/// Status code carried by the "nothing usable came back" record.
pub const UNAVAILABLE_STATUS: u16 = 500;

/// Opaque storage-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An archived response, as served back to proxy clients.
///
/// `(url, timestamp)` is the natural key. `id` is `None` until the record has
/// been persisted, and the store never reuses an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedRecord {
    pub id: Option<RecordId>,
    pub url: String,
    pub timestamp: ArchiveTimestamp,
    pub status_code: u16,
    /// Original page headers, already unwrapped from the archive envelope.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl ArchivedRecord {
    /// A freshly fetched record that has not been stored yet.
    pub fn new(
        url: impl Into<String>, timestamp: ArchiveTimestamp, status_code: u16, headers: BTreeMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        Self { id: None, url: url.into(), timestamp, status_code, headers, body }
    }

    /// The empty 500 record returned for archive misses and fetch failures.
    pub fn unavailable(url: impl Into<String>, timestamp: ArchiveTimestamp) -> Self {
        Self::new(url, timestamp, UNAVAILABLE_STATUS, BTreeMap::new(), Vec::new())
    }

    pub fn is_unavailable(&self) -> bool {
        self.status_code == UNAVAILABLE_STATUS && self.headers.is_empty() && self.body.is_empty()
    }
}
