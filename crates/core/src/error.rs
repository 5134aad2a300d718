//! Unified error types for wayback-proxy.
//!
//! Display strings carry an upper-case code prefix so log lines can be
//! grepped by failure class.

use std::sync::Arc;

use tokio_rusqlite::rusqlite;

use crate::record::RecordId;

/// Unified error types for the wayback-proxy crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: invalid stored headers: {0}")]
    InvalidHeaders(String),

    /// No record exists for the given id.
    #[error("NOT_FOUND: record {0}")]
    NotFound(RecordId),

    /// A record for the same url and timestamp is already stored.
    #[error("CONFLICT: {url} @ {timestamp}")]
    Conflict { url: String, timestamp: String },

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Timestamp not in a recognised layout.
    #[error("INVALID_TIMESTAMP: {0}")]
    InvalidTimestamp(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Network-level failure talking to the archive service.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Background task failed or a runtime primitive was shut down.
    #[error("INTERNAL: {0}")]
    Internal(String),

    /// Error produced once and handed to every waiter of a shared fetch.
    #[error("{0}")]
    Shared(Arc<Error>),
}

impl Error {
    /// Whether this error comes from the network side of an upstream fetch.
    ///
    /// These are absorbed by the request coordinator; anything else
    /// (storage in particular) propagates to the caller.
    pub fn is_fetch_error(&self) -> bool {
        match self {
            Error::FetchTimeout(_) | Error::FetchTooLarge(_) | Error::HttpError(_) | Error::InvalidUrl(_) => true,
            Error::Shared(inner) => inner.is_fetch_error(),
            _ => false,
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidHeaders(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound(RecordId(42));
        assert!(err.to_string().contains("NOT_FOUND"));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_fetch_error_classification() {
        assert!(Error::FetchTimeout("slow".into()).is_fetch_error());
        assert!(Error::HttpError("refused".into()).is_fetch_error());
        assert!(!Error::NotFound(RecordId(1)).is_fetch_error());
        assert!(!Error::MigrationFailed("boom".into()).is_fetch_error());
    }

    #[test]
    fn test_shared_error_keeps_classification() {
        let shared = Error::Shared(Arc::new(Error::FetchTimeout("slow".into())));
        assert!(shared.is_fetch_error());
        assert!(shared.to_string().starts_with("FETCH_TIMEOUT"));
    }
}
