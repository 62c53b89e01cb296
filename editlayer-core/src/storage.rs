use crate::error::{Error, Result};
use crate::models::{CommitRecord, CompositeKind, RenameEvent};
use crate::tracker::RenameLogStore;
use chrono::{DateTime, SecondsFormat};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const SCHEMA_VERSION: i32 = 1;
const RENAME_LOG_KEY: &str = "rename-log";

/// SQLite-backed state that outlives a process: the rename log and the
/// history of committed paths. Staged edits are never persisted.
pub struct Storage {
    conn: Connection,
}

pub type SharedStorage = Arc<Mutex<Storage>>;

impl Storage {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut storage = Self { conn };
        storage.initialize()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut storage = Self { conn };
        storage.initialize()?;
        Ok(storage)
    }

    fn initialize(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS commit_log (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                kind TEXT NOT NULL,
                renamed_from TEXT,
                committed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_commit_log_committed_at ON commit_log(committed_at);
            "#,
        )?;

        let version: Option<i32> = self
            .conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .optional()?;

        if version.is_none() {
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    // Key-value operations
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // Commit history
    pub fn record_commit(&self, record: &CommitRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO commit_log (id, path, kind, renamed_from, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id.to_string(),
                record.path,
                record.kind.as_str(),
                record.renamed_from,
                record
                    .committed_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn get_commit_records(&self, limit: Option<usize>) -> Result<Vec<CommitRecord>> {
        let limit = limit.map_or(-1, |n| n as i64);
        let mut stmt = self.conn.prepare(
            "SELECT id, path, kind, renamed_from, committed_at
             FROM commit_log ORDER BY committed_at DESC LIMIT ?1",
        )?;

        let records = stmt
            .query_map(params![limit], |row| Self::commit_record_from_row(row))?
            .collect::<rusqlite::Result<Vec<CommitRecord>>>()?;

        Ok(records)
    }

    fn commit_record_from_row(row: &Row) -> rusqlite::Result<CommitRecord> {
        let id: String = row.get(0)?;
        let path: String = row.get(1)?;
        let kind: String = row.get(2)?;
        let renamed_from: Option<String> = row.get(3)?;
        let committed_at: String = row.get(4)?;

        Ok(CommitRecord {
            id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
            path,
            kind: CompositeKind::parse(&kind).ok_or_else(|| {
                conversion_error(2, Error::InvalidOperation(format!("unknown kind {kind}")))
            })?,
            renamed_from,
            committed_at: DateTime::parse_from_rfc3339(&committed_at)
                .map_err(|e| conversion_error(4, e))?
                .into(),
        })
    }
}

fn conversion_error<E>(column: usize, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
}

impl RenameLogStore for Storage {
    fn load_rename_log(&self) -> Result<Vec<RenameEvent>> {
        match self.get_value(RENAME_LOG_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_rename_log(&self, events: &[RenameEvent]) -> Result<()> {
        let raw = serde_json::to_string(events)?;
        self.set_value(RENAME_LOG_KEY, &raw)
    }
}

impl RenameLogStore for SharedStorage {
    fn load_rename_log(&self) -> Result<Vec<RenameEvent>> {
        self.lock()
            .map_err(|_| Error::InvalidOperation("storage lock poisoned".to_string()))?
            .load_rename_log()
    }

    fn save_rename_log(&self, events: &[RenameEvent]) -> Result<()> {
        self.lock()
            .map_err(|_| Error::InvalidOperation("storage lock poisoned".to_string()))?
            .save_rename_log(events)
    }
}
