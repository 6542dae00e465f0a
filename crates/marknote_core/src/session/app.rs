//! Owning controller wiring session state, autosave and the image store.
//!
//! # Responsibility
//! - Share one [`SessionState`] between callers and the autosave timer.
//! - Coordinate image uploads with the note records that reference them.
//!
//! # Invariants
//! - The session lock is never held across an `.await`.
//! - Pending autosave edits are flushed before undo/redo and tab changes,
//!   including a commit the timer has already started, so history never
//!   races a stale buffer.
//! - Image store failures degrade image features only; note text editing
//!   continues.

use crate::clock::SystemClock;
use crate::config::CoreConfig;
use crate::model::note::{is_inline_data_url, Note, NotePatch, Snapshot};
use crate::repo::note_repo::NoteRepository;
use crate::service::autosave::{AutosavePipeline, EditorBuffer, SaveStatus};
use crate::service::history::HistoryManager;
use crate::session::notice::Notice;
use crate::session::state::SessionState;
use crate::store::blob_store::{BlobError, BlobStore};
use crate::store::metadata_store::{MetadataStore, PersistError, SqliteMetadataStore};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Application bootstrap/operation failure.
#[derive(Debug)]
pub enum AppError {
    /// The metadata store could not be opened.
    Storage(PersistError),
    /// An image operation failed.
    Image(BlobError),
    /// Target note does not exist.
    NoteNotFound(String),
    /// Called outside a Tokio runtime.
    NoRuntime,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::Image(err) => write!(f, "{err}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::NoRuntime => write!(f, "marknote requires a running Tokio runtime"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Image(err) => Some(err),
            Self::NoteNotFound(_) | Self::NoRuntime => None,
        }
    }
}

impl From<PersistError> for AppError {
    fn from(value: PersistError) -> Self {
        Self::Storage(value)
    }
}

impl From<BlobError> for AppError {
    fn from(value: BlobError) -> Self {
        Self::Image(value)
    }
}

/// Notes application controller.
pub struct NotesApp {
    session: Arc<Mutex<SessionState>>,
    blobs: Arc<BlobStore>,
    autosave: AutosavePipeline,
}

impl NotesApp {
    /// Opens stores per `config` and loads the note collection.
    ///
    /// Must be called from within a Tokio runtime; the autosave timer runs on
    /// it. The image store is not opened until first use.
    pub fn open(config: &CoreConfig) -> Result<Self, AppError> {
        let handle = Handle::try_current().map_err(|_| AppError::NoRuntime)?;
        let store: Box<dyn MetadataStore> = match config.metadata_db_path() {
            Some(path) => Box::new(SqliteMetadataStore::open(path, config.metadata_quota_bytes)?),
            None => Box::new(SqliteMetadataStore::open_in_memory(
                config.metadata_quota_bytes,
            )?),
        };
        let blobs = match config.image_db_path() {
            Some(path) => BlobStore::new(path),
            None => BlobStore::in_memory(),
        };
        let repo =
            NoteRepository::load_with(store, config.notes_key.clone(), Box::new(SystemClock));
        let history = HistoryManager::new(config.history_scope, config.history_limit);

        info!(
            "event=app_open module=session status=ok notes={} persistent={}",
            repo.len(),
            config.data_dir.is_some()
        );
        Ok(Self::from_parts(
            SessionState::new(repo, history),
            blobs,
            config,
            handle,
        ))
    }

    /// Assembles an app from already-built parts.
    pub fn from_parts(
        state: SessionState,
        blobs: BlobStore,
        config: &CoreConfig,
        handle: Handle,
    ) -> Self {
        let session = Arc::new(Mutex::new(state));
        let autosave = AutosavePipeline::new(
            Arc::clone(&session),
            config.autosave_delay(),
            config.status_display(),
            handle,
        );
        Self {
            session,
            blobs: Arc::new(blobs),
            autosave,
        }
    }

    /// Locks the session for reads or direct mutations.
    pub fn state(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Records an editor change; committed after the quiet period.
    pub fn edit(&mut self, buffer: EditorBuffer) {
        self.autosave.on_edit(buffer);
    }

    /// Commits any pending editor change now (explicit save).
    pub fn save_now(&mut self) -> bool {
        self.autosave.flush()
    }

    /// Discards any pending editor change.
    pub fn discard_pending(&mut self) {
        self.autosave.cancel();
    }

    pub fn has_pending_edit(&self) -> bool {
        self.autosave.is_pending()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn subscribe_save_status(&self) -> watch::Receiver<SaveStatus> {
        self.autosave.subscribe()
    }

    pub fn create_note(&mut self) -> Note {
        self.autosave.flush();
        self.state().create_note()
    }

    pub fn select_note(&mut self, id: &str) -> bool {
        self.autosave.flush();
        self.state().select_note(id)
    }

    pub fn close_tab(&mut self, id: &str) -> bool {
        self.autosave.flush();
        self.state().close_tab(id)
    }

    /// Deletes a note. A pending edit for it is dropped, not committed; a
    /// pending edit for another note is committed first.
    pub fn delete_note(&mut self, id: &str) -> bool {
        if self.autosave.pending_note_id() == Some(id) {
            self.autosave.cancel();
        } else {
            self.autosave.flush();
        }
        self.state().delete_note(id)
    }

    pub fn undo(&mut self) -> Option<Snapshot> {
        self.autosave.flush();
        self.state().undo()
    }

    pub fn redo(&mut self) -> Option<Snapshot> {
        self.autosave.flush();
        self.state().redo()
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        self.state().take_notices()
    }

    /// Uploads `data_url` as the cover of `note_id`, replacing (and deleting)
    /// a previous stored cover. Returns the new image id.
    pub async fn set_cover_image(&self, note_id: &str, data_url: &str) -> Result<String, AppError> {
        self.ensure_note(note_id)?;
        let image_id = match self.blobs.store_image(data_url).await {
            Ok(id) => id,
            Err(err) => return Err(self.image_failure(err)),
        };

        let (updated, previous) = {
            let mut state = self.state();
            let previous = state
                .note(note_id)
                .and_then(|note| note.cover_image.clone());
            let patch = NotePatch {
                cover_image: Some(Some(image_id.clone())),
                ..NotePatch::default()
            };
            (state.update_note(note_id, patch), previous)
        };
        if !updated {
            // Note vanished while the upload was in flight.
            self.delete_blob_quietly(&image_id).await;
            return Err(AppError::NoteNotFound(note_id.to_string()));
        }

        if let Some(previous) = previous.filter(|reference| !is_inline_data_url(reference)) {
            self.delete_blob_quietly(&previous).await;
        }
        Ok(image_id)
    }

    /// Clears the cover of `note_id`, deleting the stored image.
    pub async fn remove_cover_image(&self, note_id: &str) -> bool {
        let previous = {
            let mut state = self.state();
            let Some(previous) = state
                .note(note_id)
                .and_then(|note| note.cover_image.clone())
            else {
                return false;
            };
            let patch = NotePatch {
                cover_image: Some(None),
                ..NotePatch::default()
            };
            state.update_note(note_id, patch);
            previous
        };

        if !is_inline_data_url(&previous) {
            self.delete_blob_quietly(&previous).await;
        }
        true
    }

    /// Stores an inline image for `note_id` and registers its key on the
    /// note. Inline images are never deleted automatically.
    pub async fn add_inline_image(&self, note_id: &str, data_url: &str) -> Result<String, AppError> {
        self.ensure_note(note_id)?;
        let image_id = match self.blobs.store_image(data_url).await {
            Ok(id) => id,
            Err(err) => return Err(self.image_failure(err)),
        };

        let mut state = self.state();
        let Some(mut images) = state.note(note_id).map(|note| note.images.clone()) else {
            return Err(AppError::NoteNotFound(note_id.to_string()));
        };
        images.insert(image_id.clone(), serde_json::Value::Bool(true));
        state.update_note(
            note_id,
            NotePatch {
                images: Some(images),
                ..NotePatch::default()
            },
        );
        Ok(image_id)
    }

    /// Resolves an image reference to a displayable data URL.
    ///
    /// Legacy inline data URLs resolve to themselves. Store keys whose write
    /// has not landed yet, or whose store is unavailable, resolve to `None`
    /// and the caller shows a placeholder.
    pub async fn resolve_image(&self, reference: &str) -> Option<String> {
        if is_inline_data_url(reference) {
            return Some(reference.to_string());
        }
        match self.blobs.get(reference).await {
            Ok(record) => record.map(|record| record.data_url),
            Err(err) => {
                warn!("event=image_resolve module=session status=error id={reference} error={err}");
                None
            }
        }
    }

    fn ensure_note(&self, note_id: &str) -> Result<(), AppError> {
        if self.state().note(note_id).is_some() {
            Ok(())
        } else {
            Err(AppError::NoteNotFound(note_id.to_string()))
        }
    }

    fn image_failure(&self, err: BlobError) -> AppError {
        warn!("event=image_store module=session status=error error={err}");
        self.state().push_notice(Notice::image_failed());
        AppError::Image(err)
    }

    async fn delete_blob_quietly(&self, image_id: &str) {
        if let Err(err) = self.blobs.delete(image_id).await {
            warn!("event=image_delete module=session status=error id={image_id} error={err}");
        }
    }
}
