// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SQLite storage for contact submissions and the request log.
//!
//! The connection lives behind a mutex and every query runs on the blocking
//! pool, so handlers only ever await a `Result`.

use crate::models::{ContactStats, ContactStatus, ContactSubmission, NewSubmission, RequestLogEntry};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL,
    ip_address TEXT,
    user_agent TEXT,
    status TEXT NOT NULL DEFAULT 'new'
);

CREATE INDEX IF NOT EXISTS idx_contacts_email_created ON contacts (email, created_at);
CREATE INDEX IF NOT EXISTS idx_contacts_created ON contacts (created_at);

CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    endpoint TEXT,
    method TEXT,
    status_code INTEGER,
    message TEXT,
    created_at TEXT NOT NULL
);
"#;

const SUBMISSION_COLUMNS: &str =
    "id, name, email, message, ip_address, user_agent, created_at, status";

/// Storage error types.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        info!(path = %path.display(), "Connected to SQLite database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database for testing.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::Poisoned)?;
            f(&conn).map_err(StorageError::from)
        })
        .await?
    }

    /// Store a submission stamped with the current time. Returns its id.
    pub async fn insert_submission(&self, submission: NewSubmission) -> Result<i64> {
        self.insert_submission_at(submission, Utc::now()).await
    }

    /// Store a submission with an explicit creation time.
    pub async fn insert_submission_at(
        &self,
        submission: NewSubmission,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO contacts (name, email, message, ip_address, user_agent, created_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    submission.name,
                    submission.email,
                    submission.message,
                    submission.ip_address,
                    submission.user_agent,
                    to_db_time(created_at),
                    ContactStatus::New.as_str(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Count submissions from `email` created strictly after `since`.
    pub async fn count_recent_by_email(&self, email: &str, since: DateTime<Utc>) -> Result<u64> {
        let email = email.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM contacts WHERE email = ?1 AND created_at > ?2",
                params![email, to_db_time(since)],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|count| count as u64)
    }

    /// Most recent submissions first, at most `limit` rows.
    pub async fn list_submissions(&self, limit: u32) -> Result<Vec<ContactSubmission>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUBMISSION_COLUMNS} FROM contacts ORDER BY created_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], row_to_submission)?;
            rows.collect()
        })
        .await
    }

    /// Get a submission by id
    pub async fn get_submission(&self, id: i64) -> Result<Option<ContactSubmission>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {SUBMISSION_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id],
                row_to_submission,
            )
            .optional()
        })
        .await
    }

    /// Set the status of a submission. Returns the number of rows changed.
    pub async fn update_status(&self, id: i64, status: ContactStatus) -> Result<usize> {
        self.run(move |conn| {
            conn.execute(
                "UPDATE contacts SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
        })
        .await
    }

    /// Append an entry to the request log.
    pub async fn append_log(&self, entry: RequestLogEntry) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO logs (endpoint, method, status_code, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.endpoint,
                    entry.method,
                    entry.status_code,
                    entry.message,
                    to_db_time(entry.created_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Latest request log entries, newest first.
    #[cfg(test)]
    pub(crate) async fn recent_logs(&self, limit: u32) -> Result<Vec<RequestLogEntry>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT endpoint, method, status_code, message, created_at
                 FROM logs ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(RequestLogEntry {
                    endpoint: row.get(0)?,
                    method: row.get(1)?,
                    status_code: row.get(2)?,
                    message: row.get(3)?,
                    created_at: parse_db_time(row, 4)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    /// Aggregate counters relative to `now`.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<ContactStats> {
        let day_ago = to_db_time(now - ChronoDuration::days(1));
        self.run(move |conn| {
            conn.query_row(
                "SELECT
                    COUNT(*),
                    COUNT(CASE WHEN status = 'new' THEN 1 END),
                    COUNT(CASE WHEN created_at > ?1 THEN 1 END),
                    COUNT(DISTINCT ip_address)
                 FROM contacts",
                params![day_ago],
                |row| {
                    Ok(ContactStats {
                        total: row.get::<_, i64>(0)? as u64,
                        pending: row.get::<_, i64>(1)? as u64,
                        last_24h: row.get::<_, i64>(2)? as u64,
                        unique_ips: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
        })
        .await
    }

    #[cfg(test)]
    pub(crate) async fn drop_tables(&self) -> Result<()> {
        self.run(|conn| conn.execute_batch("DROP TABLE contacts; DROP TABLE logs;"))
            .await
    }
}

/// Fixed-width UTC timestamps so that text comparison orders by time.
fn to_db_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_submission(row: &Row<'_>) -> rusqlite::Result<ContactSubmission> {
    let status: String = row.get(7)?;

    Ok(ContactSubmission {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        message: row.get(3)?,
        ip_address: row.get(4)?,
        user_agent: row.get(5)?,
        created_at: parse_db_time(row, 6)?,
        status: status
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?,
    })
}
