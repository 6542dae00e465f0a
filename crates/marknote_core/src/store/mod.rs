//! Persistence surfaces mirrored from session state.
//!
//! # Responsibility
//! - `metadata_store`: synchronous key-value store for notes and preferences.
//! - `blob_store`: asynchronous object store for image payloads.
//!
//! # Invariants
//! - Stores are passive: they hold whatever the session commits.
//! - No transaction spans both stores.

pub mod blob_store;
pub mod metadata_store;
