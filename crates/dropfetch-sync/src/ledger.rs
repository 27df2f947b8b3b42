//! Durable record of every file that was fetched and verified
//!
//! The ledger is an append-only SQLite table. A record is written once, after
//! the local copy has been verified, and is never updated or removed. Both the
//! remote content hash and the whole-file SHA-256 are unique, so inserting a
//! record for content that is already known is a no-op.

use chrono::{DateTime, Utc};
use dropfetch_types::{Error, LedgerRecord, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::debug;

const SCHEMA_SQL: &str = "
PRAGMA synchronous = FULL;

CREATE TABLE IF NOT EXISTS downloaded_files (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    local_file_name     TEXT NOT NULL,
    remote_path         TEXT NOT NULL,
    remote_file_name    TEXT NOT NULL,
    sha256              TEXT NOT NULL UNIQUE,
    remote_content_hash TEXT NOT NULL UNIQUE,
    downloaded_at       TEXT NOT NULL
);
";

const SELECT_COLUMNS: &str = "local_file_name, remote_path, remote_file_name, sha256, \
                              remote_content_hash, downloaded_at";

/// SQLite-backed download ledger
#[derive(Debug)]
pub struct Ledger {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Ledger {
    /// Open or create a ledger file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            Error::ledger(format!("Failed to open ledger '{}': {}", path.display(), e))
        })?;

        Self::initialize(&conn)?;
        debug!(path = %path.display(), "ledger opened");

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a ledger that lives only as long as the value
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::ledger(format!("Failed to open in-memory ledger: {}", e)))?;
        Self::initialize(&conn)?;

        Ok(Self { conn, path: None })
    }

    fn initialize(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::ledger(format!("Failed to initialize schema: {}", e)))
    }

    /// Backing file, `None` for in-memory ledgers
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether content with this remote hash was already fetched
    pub fn is_known(&self, remote_content_hash: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM downloaded_files WHERE remote_content_hash = ?1 LIMIT 1",
                params![remote_content_hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::ledger(format!("Lookup failed: {}", e)))?;

        Ok(found.is_some())
    }

    /// Insert a record unless its content is already known
    ///
    /// Returns `true` when a row was written and `false` when either unique key
    /// already existed.
    pub fn add(&self, record: &LedgerRecord) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO downloaded_files
                 (local_file_name, remote_path, remote_file_name, sha256, remote_content_hash, downloaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.local_file_name,
                    record.remote_path,
                    record.remote_file_name,
                    record.sha256,
                    record.remote_content_hash,
                    record.downloaded_at.to_rfc3339(),
                ],
            )
            .map_err(|e| Error::ledger(format!("Insert failed: {}", e)))?;

        Ok(inserted == 1)
    }

    /// Look up the record for a remote content hash
    pub fn find_by_content_hash(&self, remote_content_hash: &str) -> Result<Option<LedgerRecord>> {
        let sql = format!(
            "SELECT {} FROM downloaded_files WHERE remote_content_hash = ?1 LIMIT 1",
            SELECT_COLUMNS
        );

        self.conn
            .query_row(&sql, params![remote_content_hash], record_from_row)
            .optional()
            .map_err(|e| Error::ledger(format!("Lookup failed: {}", e)))
    }

    /// Number of records
    pub fn len(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM downloaded_files", [], |row| row.get(0))
            .map_err(|e| Error::ledger(format!("Count failed: {}", e)))?;

        Ok(count as u64)
    }

    /// Whether the ledger holds no records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Close the underlying connection, surfacing any error
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| Error::ledger(format!("Failed to close ledger: {}", e)))
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerRecord> {
    let downloaded_at: String = row.get(5)?;
    let downloaded_at = DateTime::parse_from_rfc3339(&downloaded_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(LedgerRecord {
        local_file_name: row.get(0)?,
        remote_path: row.get(1)?,
        remote_file_name: row.get(2)?,
        sha256: row.get(3)?,
        remote_content_hash: row.get(4)?,
        downloaded_at,
    })
}
