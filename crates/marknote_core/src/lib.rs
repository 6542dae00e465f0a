//! Core domain logic for Marknote.
//! This crate owns note persistence, history, autosave and session state.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod session;
pub mod store;
pub mod transfer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::{ImageRecord, Note, NoteId, NotePatch, Snapshot};
pub use repo::note_repo::NoteRepository;
pub use search::filter::NoteFilter;
pub use service::autosave::{AutosavePipeline, EditorBuffer, SaveStatus};
pub use service::debounce::Debouncer;
pub use service::history::{HistoryManager, HistoryScope};
pub use service::tags::extract_tags;
pub use session::app::{AppError, NotesApp};
pub use session::notice::{Notice, NoticeKind};
pub use session::state::{CommitOutcome, SessionState, Theme};
pub use store::blob_store::{BlobError, BlobStore};
pub use store::metadata_store::{MetadataStore, PersistError, SqliteMetadataStore};
pub use transfer::export::ExportFormat;
pub use transfer::import::{ImportError, ImportSummary};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
