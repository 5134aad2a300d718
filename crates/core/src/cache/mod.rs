//! SQLite-backed storage for archived records.
//!
//! This module provides a persistent record cache using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Lookup by storage id and by the `(url, timestamp)` natural key
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! The [`RecordStore`] trait is the seam the request coordinator depends on;
//! [`CacheDb`] is its SQLite implementation.

pub mod connection;
pub mod migrations;
pub mod records;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use store::RecordStore;
