//! Local SQLite sink
//!
//! Stands in for the HTTP collector: records are stored per destination and
//! only accepted when strictly newer than the destination's last record.
//! A destination must be seeded with a starting point before it accepts data.

use crate::transmit_core::record::{format_record_id, parse_record_id, ResolvedRecord};
use crate::transmit_core::sink::{RecordSink, SinkError};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, SinkError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SinkError::Database(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;

        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::debug!("SQLite journal mode: {}", journal_mode);

        conn.execute(
            "CREATE TABLE IF NOT EXISTS destinations (
                destination TEXT PRIMARY KEY,
                last_record_id TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                destination TEXT NOT NULL,
                record_id TEXT NOT NULL,
                target TEXT NOT NULL,
                value REAL NOT NULL,
                UNIQUE(destination, record_id, target)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_destination_record ON records(destination, record_id)",
            [],
        )?;

        log::info!("✅ SQLite sink initialized");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, SinkError> {
        self.conn
            .lock()
            .map_err(|_| SinkError::Database("connection lock poisoned".to_string()))
    }

    /// Set the starting point of a destination; the next run fetches from one period later
    pub fn seed(&self, destination: &str, last: NaiveDateTime) -> Result<(), SinkError> {
        self.conn()?.execute(
            "INSERT INTO destinations (destination, last_record_id) VALUES (?1, ?2)
             ON CONFLICT(destination) DO UPDATE SET last_record_id = excluded.last_record_id",
            params![destination, format_record_id(&last)],
        )?;

        log::info!("🌱 Seeded {} at {}", destination, format_record_id(&last));
        Ok(())
    }

    /// Number of stored records (distinct record ids) for a destination
    pub fn record_count(&self, destination: &str) -> Result<usize, SinkError> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(DISTINCT record_id) FROM records WHERE destination = ?1",
            params![destination],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Stored value of one target
    pub fn value(&self, destination: &str, record_id: &str, target: &str) -> Result<Option<f64>, SinkError> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM records WHERE destination = ?1 AND record_id = ?2 AND target = ?3",
                params![destination, record_id, target],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

fn read_last(conn: &Connection, destination: &str) -> Result<Option<NaiveDateTime>, SinkError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT last_record_id FROM destinations WHERE destination = ?1",
            params![destination],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|raw| parse_record_id(&raw).map_err(|_| SinkError::InvalidTimestamp(raw.clone())))
        .transpose()
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn last_timestamp(&self, destination: &str) -> Result<Option<NaiveDateTime>, SinkError> {
        let conn = self.conn()?;
        read_last(&conn, destination)
    }

    async fn send(&self, destination: &str, record: &ResolvedRecord) -> Result<bool, SinkError> {
        let mut conn = self.conn()?;

        match read_last(&conn, destination)? {
            None => {
                log::debug!("Destination {} is not seeded", destination);
                return Ok(false);
            }
            Some(last) if record.record_id <= last => {
                log::debug!(
                    "Record {} is not newer than {} for {}",
                    record.id(),
                    format_record_id(&last),
                    destination
                );
                return Ok(false);
            }
            Some(_) => {}
        }

        let record_id = record.id();
        let tx = conn.transaction()?;

        for (target, value) in &record.values {
            tx.execute(
                "INSERT INTO records (destination, record_id, target, value) VALUES (?1, ?2, ?3, ?4)",
                params![destination, record_id, target, value],
            )?;
        }

        tx.execute(
            "UPDATE destinations SET last_record_id = ?2 WHERE destination = ?1",
            params![destination, record_id],
        )?;

        tx.commit()?;
        Ok(true)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
