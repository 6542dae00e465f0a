//! Core use-case services.
//!
//! # Responsibility
//! - Tag derivation, undo/redo history and the autosave pipeline.
//! - Keep timer and history mechanics decoupled from storage details.

pub mod autosave;
pub mod debounce;
pub mod history;
pub mod tags;
