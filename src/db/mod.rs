//! SQLite-backed fingerprint store.

mod schema;

use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use schema::SCHEMA;

/// A persisted fingerprint entry. Created once at first sighting of a
/// content hash, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerprintRecord {
    pub id: i64,
    pub filename: String,
    pub uploaded_at: String,
    pub content_hash: String,
    pub perceptual_hash: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The uniqueness constraint on content_hash fired on insert.
    #[error("content hash already stored")]
    Constraint,
    #[error("could not prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file. Multiple handles on the same
    /// file may write concurrently, so the connection gets a busy timeout
    /// and WAL journaling up front.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
        Ok(Self { conn })
    }

    /// Idempotently create the table and its indexes. Safe to call on
    /// every process start.
    pub fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Exact lookup by content hash. At most one record exists by
    /// construction of the uniqueness constraint.
    pub fn find_by_content_hash(&self, content_hash: &str) -> Result<Option<FingerprintRecord>, StoreError> {
        let result = self.conn.query_row(
            r#"
            SELECT id, filename, uploaded_at, content_hash, perceptual_hash
            FROM fingerprints
            WHERE content_hash = ?
            "#,
            [content_hash],
            record_from_row,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Durable insert of a new fingerprint record. Returns the assigned id,
    /// or `StoreError::Constraint` if this content hash is already stored.
    pub fn insert(
        &self,
        filename: &str,
        uploaded_at: &str,
        content_hash: &str,
        perceptual_hash: &str,
    ) -> Result<i64, StoreError> {
        let result = self.conn.execute(
            r#"
            INSERT INTO fingerprints (filename, uploaded_at, content_hash, perceptual_hash)
            VALUES (?, ?, ?, ?)
            "#,
            params![filename, uploaded_at, content_hash, perceptual_hash],
        );
        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) => {
                Err(StoreError::Constraint)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Up to `limit` records, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<FingerprintRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, filename, uploaded_at, content_hash, perceptual_hash
            FROM fingerprints
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let records = stmt
            .query_map([limit as i64], record_from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<FingerprintRecord>, StoreError> {
        let result = self.conn.query_row(
            r#"
            SELECT id, filename, uploaded_at, content_hash, perceptual_hash
            FROM fingerprints
            WHERE id = ?
            "#,
            [id],
            record_from_row,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn record_from_row(row: &rusqlite::Row) -> rusqlite::Result<FingerprintRecord> {
    Ok(FingerprintRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        uploaded_at: row.get(2)?,
        content_hash: row.get(3)?,
        perceptual_hash: row.get(4)?,
    })
}
