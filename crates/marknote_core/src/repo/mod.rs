//! Repository layer over the metadata store.
//!
//! # Responsibility
//! - Own the in-memory note collection and its persistence.
//! - Keep serialization and storage details out of session orchestration.
//!
//! # Invariants
//! - Every mutation ends with a full-collection save.
//! - Missing entities are reported as `false`, not as errors.

pub mod note_repo;
