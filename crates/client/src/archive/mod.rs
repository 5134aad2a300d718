//! Pure transformations applied to archive service responses.
//!
//! - [`headers`]: detect genuine captures and unwrap `x-archive-orig-*` headers
//! - [`normalize`]: charset-aware scheme rewriting for archived HTML

pub mod headers;
pub mod normalize;

pub use headers::{ARCHIVE_ORIGINAL_PREFIX, ARCHIVE_SOURCE_HEADER, TranslatedHeaders, is_unsafe_header, translate_headers};
pub use normalize::{detect_encoding, is_html, normalize_body};
