//! Target URL validation and snapshot URL construction.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use waybackproxy_core::ArchiveTimestamp;

/// Characters that cannot appear verbatim in the snapshot URL's path.
///
/// The target's own `:`, `/`, `?`, `&` and `=` are kept so the archive
/// service sees the URL the way it was requested.
const PATH_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Error type for target URL validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host: {0}")]
    MissingHost(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Check that a requested URL is something the archive can serve.
///
/// Only absolute `http`/`https` URLs with a host are accepted. The input is
/// not rewritten; the cache keys on the URL exactly as requested.
pub fn validate_target(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost(trimmed.to_string()));
    }

    Ok(parsed)
}

/// Build the identity-variant snapshot URL: `<base>/web/<timestamp>id_/<target>`.
pub fn snapshot_url(base_url: &str, target: &str, timestamp: ArchiveTimestamp) -> String {
    format!(
        "{}/web/{}id_/{}",
        base_url.trim_end_matches('/'),
        timestamp,
        utf8_percent_encode(target.trim(), PATH_UNSAFE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> ArchiveTimestamp {
        ArchiveTimestamp::parse("20030405060708").unwrap()
    }

    #[test]
    fn test_snapshot_url_basic() {
        let url = snapshot_url("https://web.archive.org", "http://example.com/", ts());
        assert_eq!(url, "https://web.archive.org/web/20030405060708id_/http://example.com/");
    }

    #[test]
    fn test_snapshot_url_keeps_query() {
        let url = snapshot_url("https://web.archive.org/", "http://example.com/search?q=rust&page=2", ts());
        assert_eq!(url, "https://web.archive.org/web/20030405060708id_/http://example.com/search?q=rust&page=2");
    }

    #[test]
    fn test_snapshot_url_encodes_unsafe_characters() {
        let url = snapshot_url("https://web.archive.org", "http://example.com/a b/\"c\"#top", ts());
        assert_eq!(url, "https://web.archive.org/web/20030405060708id_/http://example.com/a%20b/%22c%22%23top");
    }

    #[test]
    fn test_snapshot_url_encodes_non_ascii() {
        let url = snapshot_url("https://web.archive.org", "http://example.com/café", ts());
        assert!(url.ends_with("/caf%C3%A9"));
    }

    #[test]
    fn test_validate_target_accepts_http_and_https() {
        assert!(validate_target("http://example.com/").is_ok());
        assert!(validate_target("https://example.com/path?x=1").is_ok());
    }

    #[test]
    fn test_validate_target_rejects_other_schemes() {
        let result = validate_target("ftp://example.com/file");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_validate_target_rejects_relative() {
        let result = validate_target("/just/a/path");
        assert!(matches!(result, Err(UrlError::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_target_empty() {
        assert!(matches!(validate_target("   "), Err(UrlError::Empty)));
    }
}
