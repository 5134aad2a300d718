//! HTML normalization for archived pages.
//!
//! Archived pages link to their own absolute `https://` URLs. Those links are
//! rewritten to `http://` so the browser keeps routing them through the proxy
//! instead of leaving for the live site. The body is decoded with its detected
//! charset first and re-encoded with the same charset afterwards.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

const SECURE_SCHEME: &str = "https://";
const INSECURE_SCHEME: &str = "http://";

/// Whether a Content-Type value denotes HTML.
pub fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/html"))
}

/// Most likely text encoding of `body`.
///
/// A byte order mark wins; otherwise statistical detection decides.
pub fn detect_encoding(body: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return encoding;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(body, true);
    detector.guess(None, true)
}

/// Normalize a response body according to its content type.
///
/// Non-HTML bodies pass through untouched. HTML bodies that cannot be decoded
/// and re-encoded losslessly with their detected charset also pass through.
pub fn normalize_body<'a>(body: &'a [u8], content_type: Option<&str>) -> Cow<'a, [u8]> {
    if !is_html(content_type) {
        return Cow::Borrowed(body);
    }

    match rewrite_secure_links(body) {
        Some(rewritten) => Cow::Owned(rewritten),
        None => {
            tracing::debug!(len = body.len(), "charset round trip failed; leaving body unmodified");
            Cow::Borrowed(body)
        }
    }
}

fn rewrite_secure_links(body: &[u8]) -> Option<Vec<u8>> {
    let encoding = detect_encoding(body);

    // UTF-16 encodes back to UTF-8 in encoding_rs, which would change the charset.
    if encoding.output_encoding() != encoding {
        return None;
    }

    let text = encoding.decode_without_bom_handling_and_without_replacement(body)?;
    if !text.contains(SECURE_SCHEME) {
        return Some(body.to_vec());
    }

    let rewritten = text.replace(SECURE_SCHEME, INSECURE_SCHEME);
    let (bytes, _, unmappable) = encoding.encode(&rewritten);
    if unmappable {
        return None;
    }

    Some(bytes.into_owned())
}
