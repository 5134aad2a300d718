//! Upstream fetch pipeline against the archive service.
//!
//! ### Snapshot Requests
//! - `GET <base>/web/<yyyyMMddHHmmss>id_/<url>` selects the unmodified capture
//! - Non-2xx statuses are returned as data, never raised as errors
//! - Nearest-capture redirects are followed (default: 10)
//!
//! ### Translation
//! - Responses without `x-archive-src` are misses and become the empty 500 record
//! - `x-archive-orig-*` headers are unwrapped, unsafe names dropped
//! - HTML bodies get charset-aware `https://` to `http://` rewriting
//!
//! ### Failures
//! - Timeouts, connection and DNS failures surface as errors; nothing is retried here

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, header};
use waybackproxy_core::{AppConfig, ArchiveTimestamp, ArchivedRecord, Error};

use crate::archive::{normalize_body, translate_headers};

pub use self::url::{UrlError, snapshot_url, validate_target};

/// Configuration for the archive client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Archive service origin (default: "https://web.archive.org")
    pub base_url: String,

    /// User agent string (default: "wayback-proxy/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 50MB)
    pub max_bytes: usize,

    /// Connect and whole-request timeout (default: 60s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://web.archive.org".to_string(),
            user_agent: "wayback-proxy/0.1".to_string(),
            max_bytes: 50 * 1024 * 1024,
            timeout: Duration::from_secs(60),
            max_redirects: 10,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.archive_base_url.clone(),
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// What the archive service answered for a snapshot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A genuine capture, ready to be stored.
    Archived(ArchivedRecord),
    /// No capture; always the empty 500 record, never stored.
    NotArchived(ArchivedRecord),
}

impl FetchOutcome {
    pub fn into_record(self) -> ArchivedRecord {
        match self {
            FetchOutcome::Archived(record) | FetchOutcome::NotArchived(record) => record,
        }
    }
}

/// Source of fresh archived records.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the capture of `url` nearest to `timestamp`.
    ///
    /// Returned records have no id. Network failures are errors.
    async fn fetch(&self, url: &str, timestamp: ArchiveTimestamp) -> Result<FetchOutcome, Error>;
}

/// HTTP client for the archive service.
pub struct ArchiveClient {
    http: Client,
    config: FetchConfig,
}

impl ArchiveClient {
    /// Create a new archive client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .redirect(redirect_policy(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn network_error(snapshot_url: &str, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::FetchTimeout(format!("{snapshot_url}: {err}"))
        } else {
            Error::HttpError(format!("network error for {snapshot_url}: {err}"))
        }
    }
}

/// Follow up to `max` redirects, then hand back the last 3xx as the response.
fn redirect_policy(max: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

#[async_trait]
impl Fetcher for ArchiveClient {
    async fn fetch(&self, url: &str, timestamp: ArchiveTimestamp) -> Result<FetchOutcome, Error> {
        validate_target(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let start = Instant::now();
        let snapshot_url = snapshot_url(&self.config.base_url, url, timestamp);

        let response = self
            .http
            .get(&snapshot_url)
            .send()
            .await
            .map_err(|e| Self::network_error(&snapshot_url, &e))?;

        let status = response.status();
        let translated = translate_headers(response.headers());

        if !translated.archived {
            tracing::info!(
                "{} {} -> not archived ({}ms)",
                status.as_u16(),
                snapshot_url,
                start.elapsed().as_millis()
            );
            return Ok(FetchOutcome::NotArchived(ArchivedRecord::unavailable(url, timestamp)));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| translated.headers.get("content-type").cloned());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::network_error(&snapshot_url, &e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let body = normalize_body(&bytes, content_type.as_deref()).into_owned();

        tracing::info!(
            "{} {} ({}ms, {} bytes)",
            status.as_u16(),
            snapshot_url,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(FetchOutcome::Archived(ArchivedRecord::new(
            url,
            timestamp,
            status.as_u16(),
            translated.headers,
            body,
        )))
    }
}
