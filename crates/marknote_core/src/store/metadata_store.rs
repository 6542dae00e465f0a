//! Synchronous, quota-bounded key-value store for notes and preferences.
//!
//! # Responsibility
//! - Persist string values under string keys in the `kv` table.
//! - Enforce a byte quota across all keys.
//! - Serialize/deserialize the full note collection under one key.
//!
//! # Invariants
//! - A rejected `set` leaves the previous value intact.
//! - `load_notes` never fails: absent or corrupt payloads load as empty.
//! - `save_notes` always writes the whole collection; no incremental diffing.

use crate::db::{open_db, open_db_in_memory, DbError, Schema};
use crate::model::note::Note;
use log::{error, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type PersistResult<T> = Result<T, PersistError>;

/// Persistence failure reported by store writes.
#[derive(Debug)]
pub enum PersistError {
    /// The value could not be serialized.
    Serialization(serde_json::Error),
    /// The write would exceed the store quota.
    QuotaExceeded { needed: u64, quota: u64 },
    /// Underlying storage failure.
    Storage(DbError),
}

impl PersistError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Message shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => {
                "Storage is full. Remove some images or export your notes to free up space."
            }
            Self::Serialization(_) | Self::Storage(_) => {
                "Failed to save notes. Your changes are kept in memory; try again."
            }
        }
    }
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(err) => write!(f, "failed to serialize value: {err}"),
            Self::QuotaExceeded { needed, quota } => {
                write!(f, "storage quota exceeded: need {needed} bytes, quota {quota}")
            }
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            Self::QuotaExceeded { .. } => None,
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<DbError> for PersistError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Key-value persistence contract.
pub trait MetadataStore: Send {
    fn get(&self, key: &str) -> PersistResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> PersistResult<()>;
    fn remove(&mut self, key: &str) -> PersistResult<()>;
    /// Bytes currently counted against the quota.
    fn used_bytes(&self) -> PersistResult<u64>;

    /// Loads the note collection stored under `key`.
    ///
    /// Absent key -> empty. Unreadable or corrupt payload -> empty, logged.
    fn load_notes(&self, key: &str) -> Vec<Note> {
        let raw = match self.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                error!("event=notes_load module=store status=error error_code=read_failed error={err}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Note>>(&raw) {
            Ok(notes) => notes,
            Err(err) => {
                error!(
                    "event=notes_load module=store status=error error_code=corrupt_payload bytes={} error={err}",
                    raw.len()
                );
                Vec::new()
            }
        }
    }

    /// Serializes and stores the full note collection under `key`.
    fn save_notes(&mut self, key: &str, notes: &[Note]) -> PersistResult<()> {
        let payload = serialize_notes(notes)?;
        self.set(key, &payload)
    }
}

/// Serializes a note collection in the persistence wire format.
pub fn serialize_notes(notes: &[Note]) -> PersistResult<String> {
    Ok(serde_json::to_string(notes)?)
}

/// SQLite-backed key-value store with a byte quota.
pub struct SqliteMetadataStore {
    conn: Connection,
    quota_bytes: u64,
}

impl SqliteMetadataStore {
    /// Opens (or creates) a metadata database file.
    pub fn open(path: impl AsRef<Path>, quota_bytes: u64) -> PersistResult<Self> {
        let conn = open_db(path, Schema::Metadata)?;
        Ok(Self { conn, quota_bytes })
    }

    /// Opens a fresh in-memory metadata database.
    pub fn open_in_memory(quota_bytes: u64) -> PersistResult<Self> {
        let conn = open_db_in_memory(Schema::Metadata)?;
        Ok(Self { conn, quota_bytes })
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    fn bytes_excluding(&self, key: &str) -> PersistResult<u64> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM kv
             WHERE key != ?1;",
            [key],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as u64)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn get(&self, key: &str) -> PersistResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1;", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> PersistResult<()> {
        let needed = self.bytes_excluding(key)? + key.len() as u64 + value.len() as u64;
        if needed > self.quota_bytes {
            warn!(
                "event=kv_set module=store status=rejected error_code=quota_exceeded key={key} needed={needed} quota={}",
                self.quota_bytes
            );
            return Err(PersistError::QuotaExceeded {
                needed,
                quota: self.quota_bytes,
            });
        }

        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> PersistResult<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn used_bytes(&self) -> PersistResult<u64> {
        self.bytes_excluding("")
    }
}

#[cfg(test)]
mod tests {
    use super::{MetadataStore, PersistError, SqliteMetadataStore};

    #[test]
    fn set_get_remove_round_trip() {
        let mut store = SqliteMetadataStore::open_in_memory(1024).unwrap();
        assert_eq!(store.get("theme").unwrap(), None);

        store.set("theme", "dark").unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(store.used_bytes().unwrap(), 9);

        store.remove("theme").unwrap();
        assert_eq!(store.get("theme").unwrap(), None);
    }

    #[test]
    fn overwrite_does_not_double_count_quota() {
        let mut store = SqliteMetadataStore::open_in_memory(10).unwrap();
        store.set("k", "12345678").unwrap();
        store.set("k", "87654321").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("87654321"));
    }

    #[test]
    fn quota_rejection_keeps_previous_value() {
        let mut store = SqliteMetadataStore::open_in_memory(8).unwrap();
        store.set("k", "small").unwrap();

        let err = store.set("k", "far too large").unwrap_err();
        assert!(matches!(err, PersistError::QuotaExceeded { quota: 8, .. }));
        assert!(err.is_quota_exceeded());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("small"));
    }

    #[test]
    fn corrupt_payload_loads_as_empty() {
        let mut store = SqliteMetadataStore::open_in_memory(1024).unwrap();
        store.set("notes", "{not json").unwrap();
        assert!(store.load_notes("notes").is_empty());
        assert!(store.load_notes("missing").is_empty());
    }
}
