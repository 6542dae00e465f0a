//! Note domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one JSON shape for persistence, import and export.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Unknown fields are carried, not dropped.
//!
//! # See also
//! - `crate::transfer` for the import/export shapes built on these types.

pub mod note;
