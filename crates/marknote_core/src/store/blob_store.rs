//! Asynchronous image object store.
//!
//! # Responsibility
//! - Persist image records (`{id, dataUrl, timestamp}`) keyed by id.
//! - Open the backing database lazily, once, on first use.
//!
//! # Invariants
//! - Concurrent first callers share one initialization; the database is
//!   never opened twice by the same store.
//! - A failed open leaves the store uninitialized so the next call retries.
//! - `get` on a missing key resolves to `None`, never to an error.
//! - SQLite work runs on the blocking pool, never on the async worker.

use crate::db::{open_db, open_db_in_memory, DbError, Schema};
use crate::model::note::{generate_image_id, ImageRecord};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

pub type BlobResult<T> = Result<T, BlobError>;

/// Image store failure.
#[derive(Debug)]
pub enum BlobError {
    /// The backing database could not be opened or migrated.
    Unavailable(DbError),
    /// A read or write against an open database failed.
    Db(DbError),
    /// The blocking task running the operation did not complete.
    Task(String),
}

impl Display for BlobError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(err) => write!(f, "image store unavailable: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Task(message) => write!(f, "image store task failed: {message}"),
        }
    }
}

impl Error for BlobError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) | Self::Db(err) => Some(err),
            Self::Task(_) => None,
        }
    }
}

impl From<rusqlite::Error> for BlobError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[derive(Debug, Clone)]
enum BlobLocation {
    File(PathBuf),
    Memory,
}

type SharedConnection = Arc<Mutex<Connection>>;

/// SQLite-backed image store with lazy, shared initialization.
pub struct BlobStore {
    location: BlobLocation,
    conn: OnceCell<SharedConnection>,
    open_attempts: AtomicU32,
}

impl BlobStore {
    /// Store backed by a database file. Nothing is opened until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_location(BlobLocation::File(path.into()))
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory() -> Self {
        Self::with_location(BlobLocation::Memory)
    }

    fn with_location(location: BlobLocation) -> Self {
        Self {
            location,
            conn: OnceCell::new(),
            open_attempts: AtomicU32::new(0),
        }
    }

    /// Whether the backing database has been opened.
    pub fn is_open(&self) -> bool {
        self.conn.initialized()
    }

    /// Number of times opening the backing database was attempted.
    pub fn open_attempts(&self) -> u32 {
        self.open_attempts.load(Ordering::SeqCst)
    }

    /// Writes (or overwrites) one image record.
    pub async fn put(&self, id: &str, data_url: &str) -> BlobResult<()> {
        let record = ImageRecord {
            id: id.to_string(),
            data_url: data_url.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };
        let bytes = record.data_url.len();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO images (id, data_url, timestamp)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    data_url = excluded.data_url,
                    timestamp = excluded.timestamp;",
                params![record.id, record.data_url, record.timestamp],
            )?;
            Ok(())
        })
        .await?;
        info!("event=image_put module=blob_store status=ok id={id} bytes={bytes}");
        Ok(())
    }

    /// Reads one image record. Missing ids resolve to `None`.
    pub async fn get(&self, id: &str) -> BlobResult<Option<ImageRecord>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let record = conn
                .query_row(
                    "SELECT id, data_url, timestamp FROM images WHERE id = ?1;",
                    [id.as_str()],
                    |row| {
                        Ok(ImageRecord {
                            id: row.get("id")?,
                            data_url: row.get("data_url")?,
                            timestamp: row.get("timestamp")?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    /// Deletes one image record. Deleting a missing id is not an error.
    pub async fn delete(&self, id: &str) -> BlobResult<()> {
        let owned = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM images WHERE id = ?1;", [owned.as_str()])?;
            Ok(())
        })
        .await?;
        info!("event=image_delete module=blob_store status=ok id={id}");
        Ok(())
    }

    /// Stores a new image under a generated id and returns the id.
    pub async fn store_image(&self, data_url: &str) -> BlobResult<String> {
        let id = generate_image_id(Utc::now().timestamp_millis());
        self.put(&id, data_url).await?;
        Ok(id)
    }

    async fn connection(&self) -> BlobResult<SharedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| {
                self.open_attempts.fetch_add(1, Ordering::SeqCst);
                open_location(self.location.clone())
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    async fn with_conn<T, F>(&self, op: F) -> BlobResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> BlobResult<T> + Send + 'static,
    {
        let conn = self.connection().await?;
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            op(&guard)
        })
        .await
        .map_err(|err| BlobError::Task(err.to_string()))?
    }
}

async fn open_location(location: BlobLocation) -> BlobResult<SharedConnection> {
    let opened = tokio::task::spawn_blocking(move || match location {
        BlobLocation::File(path) => open_db(path, Schema::Images),
        BlobLocation::Memory => open_db_in_memory(Schema::Images),
    })
    .await
    .map_err(|err| BlobError::Task(err.to_string()))?;

    match opened {
        Ok(conn) => Ok(Arc::new(Mutex::new(conn))),
        Err(err) => {
            error!(
                "event=image_store_open module=blob_store status=error error_code=open_failed error={err}"
            );
            Err(BlobError::Unavailable(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BlobStore;

    #[tokio::test]
    async fn store_opens_lazily() {
        let store = BlobStore::in_memory();
        assert!(!store.is_open());

        assert_eq!(store.get("absent").await.unwrap(), None);
        assert!(store.is_open());
        assert_eq!(store.open_attempts(), 1);
    }

    #[tokio::test]
    async fn store_image_generates_prefixed_ids() {
        let store = BlobStore::in_memory();
        let id = store.store_image("data:image/png;base64,AAAA").await.unwrap();
        assert!(id.starts_with("img_"));

        let record = store.get(&id).await.unwrap().expect("record should exist");
        assert_eq!(record.data_url, "data:image/png;base64,AAAA");
    }
}
