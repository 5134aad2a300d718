//! Archived record CRUD operations.
//!
//! Provides functions for creating, reading, updating, and deleting
//! cached archive responses.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, ErrorCode, OptionalExtension, params_from_iter, types::Value};

use super::connection::CacheDb;
use super::store::RecordStore;
use crate::Error;
use crate::record::{ArchivedRecord, RecordId};
use crate::timestamp::ArchiveTimestamp;

const SELECT_COLUMNS: &str = "SELECT id, url, timestamp, status_code, headers_json, body FROM archived_records";

/// A row as stored, before timestamp and header decoding.
struct StoredRow {
    id: i64,
    url: String,
    timestamp: String,
    status_code: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            timestamp: row.get(2)?,
            status_code: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<ArchivedRecord, Error> {
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers_json)?;
        Ok(ArchivedRecord {
            id: Some(RecordId(self.id)),
            url: self.url,
            timestamp: ArchiveTimestamp::parse(&self.timestamp)?,
            status_code: self.status_code,
            headers,
            body: self.body,
        })
    }
}

fn select_by_id(conn: &rusqlite::Connection, id: i64) -> Result<Option<StoredRow>, Error> {
    let row = conn
        .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], StoredRow::from_row)
        .optional()?;
    Ok(row)
}

impl CacheDb {
    /// Get a record by its natural key.
    ///
    /// Returns None if nothing is stored for that exact url and timestamp.
    pub async fn get_record(&self, url: &str, timestamp: ArchiveTimestamp) -> Result<Option<ArchivedRecord>, Error> {
        let url = url.to_string();
        let timestamp = timestamp.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let row = conn
                    .query_row(
                        &format!("{SELECT_COLUMNS} WHERE url = ?1 AND timestamp = ?2"),
                        params![url, timestamp],
                        StoredRow::from_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?
            .map(StoredRow::into_record)
            .transpose()
    }

    /// Get a record by id.
    pub async fn get_record_by_id(&self, id: RecordId) -> Result<Option<ArchivedRecord>, Error> {
        self.conn
            .call(move |conn| select_by_id(conn, id.0))
            .await
            .map_err(Error::from)?
            .map(StoredRow::into_record)
            .transpose()
    }

    /// Insert a new record, assigning it an id.
    pub async fn insert_record(&self, record: &ArchivedRecord) -> Result<ArchivedRecord, Error> {
        let headers_json = serde_json::to_string(&record.headers)?;
        let url = record.url.clone();
        let timestamp = record.timestamp.to_string();
        let status_code = record.status_code;
        let body = record.body.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        let id = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                let inserted = conn.execute(
                    "INSERT INTO archived_records (url, timestamp, status_code, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![&url, &timestamp, status_code, headers_json, body, stored_at],
                );

                match inserted {
                    Ok(_) => Ok(conn.last_insert_rowid()),
                    Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                        Err(Error::Conflict { url, timestamp })
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(id, url = %record.url, timestamp = %record.timestamp, "stored archived record");

        Ok(ArchivedRecord { id: Some(RecordId(id)), ..record.clone() })
    }

    /// Overwrite the fields of an existing record.
    ///
    /// Only columns whose value differs from the stored one are written.
    pub async fn update_record(&self, id: RecordId, record: &ArchivedRecord) -> Result<(), Error> {
        let headers_json = serde_json::to_string(&record.headers)?;
        let url = record.url.clone();
        let timestamp = record.timestamp.to_string();
        let status_code = record.status_code;
        let body = record.body.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let existing = select_by_id(&tx, id.0)?.ok_or(Error::NotFound(id))?;

                let mut columns: Vec<&str> = Vec::new();
                let mut values: Vec<Value> = Vec::new();
                if existing.url != url {
                    columns.push("url");
                    values.push(Value::Text(url));
                }
                if existing.timestamp != timestamp {
                    columns.push("timestamp");
                    values.push(Value::Text(timestamp));
                }
                if existing.status_code != status_code {
                    columns.push("status_code");
                    values.push(Value::Integer(i64::from(status_code)));
                }
                if existing.headers_json != headers_json {
                    columns.push("headers_json");
                    values.push(Value::Text(headers_json));
                }
                if existing.body != body {
                    columns.push("body");
                    values.push(Value::Blob(body));
                }

                if columns.is_empty() {
                    return Ok(());
                }

                let assignments = columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| format!("{column} = ?{}", i + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!("UPDATE archived_records SET {assignments} WHERE id = ?{}", columns.len() + 1);
                values.push(Value::Integer(id.0));

                tx.execute(&sql, params_from_iter(values))?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a record by id.
    pub async fn delete_record(&self, id: RecordId) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let deleted = conn.execute("DELETE FROM archived_records WHERE id = ?1", params![id.0])?;
                if deleted == 0 {
                    return Err(Error::NotFound(id));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored records.
    pub async fn count_records(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM archived_records", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl RecordStore for CacheDb {
    async fn find_by_url_and_timestamp(
        &self, url: &str, timestamp: ArchiveTimestamp,
    ) -> Result<Option<ArchivedRecord>, Error> {
        self.get_record(url, timestamp).await
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<ArchivedRecord>, Error> {
        self.get_record_by_id(id).await
    }

    async fn insert(&self, record: &ArchivedRecord) -> Result<ArchivedRecord, Error> {
        self.insert_record(record).await
    }

    async fn update(&self, id: RecordId, record: &ArchivedRecord) -> Result<(), Error> {
        self.update_record(id, record).await
    }

    async fn delete(&self, id: RecordId) -> Result<(), Error> {
        self.delete_record(id).await
    }

    async fn count(&self) -> Result<u64, Error> {
        self.count_records().await
    }
}
