//! Archive client code for wayback-proxy.
//!
//! This crate provides the upstream fetch pipeline against the archive
//! service, archive envelope translation, HTML normalization, and the
//! request coordinator that ties fetching to the record store.

pub mod archive;
pub mod coordinator;
pub mod fetch;

pub use archive::{TranslatedHeaders, normalize_body, translate_headers};
pub use coordinator::Coordinator;
pub use fetch::{ArchiveClient, FetchConfig, FetchOutcome, Fetcher};
