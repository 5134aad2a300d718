//! Core types and shared functionality for wayback-proxy.
//!
//! This crate provides:
//! - The archived record data model and target timestamp types
//! - Record storage with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod record;
pub mod timestamp;

pub use cache::{CacheDb, RecordStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use record::{ArchivedRecord, RecordId};
pub use timestamp::{ArchiveTimestamp, TimestampCell};
