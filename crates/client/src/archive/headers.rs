//! Archive envelope header translation.
//!
//! A genuine capture carries `x-archive-src`; the original page's headers
//! travel as `x-archive-orig-<name>`. Everything else on the response belongs
//! to the archive service itself.

use std::collections::BTreeMap;

use reqwest::header::HeaderMap;

/// Present only on responses that are real archived captures.
pub const ARCHIVE_SOURCE_HEADER: &str = "x-archive-src";

/// Prefix wrapping each original response header.
pub const ARCHIVE_ORIGINAL_PREFIX: &str = "x-archive-orig-";

/// Headers never replayed to clients.
///
/// Hop-by-hop headers plus framing headers that no longer describe the
/// stored body, which is decoded and possibly rewritten.
const UNSAFE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
];

/// Result of unwrapping an archive response's headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedHeaders {
    /// Whether the response is a genuine capture.
    pub archived: bool,
    /// Original headers, prefix stripped and unsafe names removed.
    pub headers: BTreeMap<String, String>,
}

/// Whether a bare header name must not be forwarded to clients.
pub fn is_unsafe_header(name: &str) -> bool {
    UNSAFE_HEADERS.iter().any(|unsafe_name| unsafe_name.eq_ignore_ascii_case(name))
}

/// Translate archive service response headers into the original page's headers.
///
/// Repeated original headers keep the last value seen.
pub fn translate_headers(upstream: &HeaderMap) -> TranslatedHeaders {
    let archived = upstream.contains_key(ARCHIVE_SOURCE_HEADER);

    let headers = upstream
        .iter()
        .filter_map(|(name, value)| {
            let bare = name.as_str().strip_prefix(ARCHIVE_ORIGINAL_PREFIX)?;
            if bare.is_empty() || is_unsafe_header(bare) {
                return None;
            }
            Some((bare.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        })
        .collect();

    TranslatedHeaders { archived, headers }
}
