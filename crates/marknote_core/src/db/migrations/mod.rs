//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations per database in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic within one schema.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub sql: &'static str,
}

/// Databases owned by the core, each with its own migration history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Key-value store holding the note list and preferences.
    Metadata,
    /// Image object store.
    Images,
}

const METADATA_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("metadata_0001_kv.sql"),
}];

const IMAGE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("images_0001_init.sql"),
}];

impl Schema {
    pub fn migrations(self) -> &'static [Migration] {
        match self {
            Self::Metadata => METADATA_MIGRATIONS,
            Self::Images => IMAGE_MIGRATIONS,
        }
    }

    /// Short label used in log events.
    pub fn label(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Images => "images",
        }
    }
}

/// Returns the latest migration version known by this binary for `schema`.
pub fn latest_version(schema: Schema) -> u32 {
    schema
        .migrations()
        .last()
        .map_or(0, |migration| migration.version)
}

/// Applies all pending migrations of `schema` on the provided connection.
pub fn apply_migrations(conn: &mut Connection, schema: Schema) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version(schema);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            schema: schema.label(),
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in schema.migrations() {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
