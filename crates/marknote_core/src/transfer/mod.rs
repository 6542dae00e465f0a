//! Backup import and export formats.
//!
//! # Responsibility
//! - Validate and merge JSON backups into the collection.
//! - Render notes for backup, plain text and Markdown export.

pub mod export;
pub mod import;
