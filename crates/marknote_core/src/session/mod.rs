//! Session orchestration.
//!
//! # Responsibility
//! - `state`: the single owner of notes, history, tabs, filter and preferences.
//! - `app`: runtime wiring for autosave timers and image storage.
//! - `notice`: user-facing notifications raised along the way.

pub mod app;
pub mod notice;
pub mod state;
