//! Debounced autosave from the live editor buffer into session state.
//!
//! # Responsibility
//! - Collapse editor bursts into one commit after a quiet period.
//! - Publish save status (`Idle -> Saving -> Saved -> Idle`) to observers.
//!
//! # Invariants
//! - The debounce timer is scoped to the whole pipeline: only one note is
//!   live in the editor at a time, and the buffer carries its note id.
//! - A commit snapshots the pre-commit state for undo before writing.
//! - `Saved` reverts to `Idle` only if no later commit happened meanwhile.

use crate::model::note::NoteId;
use crate::session::state::{CommitOutcome, SessionState};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::debounce::Debouncer;

/// Quiet period before an edit burst is committed.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(400);
/// How long `Saved` stays visible before reverting to `Idle`.
pub const DEFAULT_STATUS_DISPLAY: Duration = Duration::from_secs(2);

/// Save indicator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    /// The commit was applied in memory but could not be persisted.
    Failed { quota_exceeded: bool },
}

/// Live editor contents for one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorBuffer {
    pub note_id: NoteId,
    pub title: String,
    pub content: String,
}

impl EditorBuffer {
    pub fn new(
        note_id: impl Into<NoteId>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            note_id: note_id.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Debounced commit path.
pub struct AutosavePipeline {
    session: Arc<Mutex<SessionState>>,
    debouncer: Debouncer,
    pending_note: Option<NoteId>,
    status: Arc<watch::Sender<SaveStatus>>,
    generation: Arc<AtomicU64>,
    status_display: Duration,
    handle: Handle,
}

impl AutosavePipeline {
    pub fn new(
        session: Arc<Mutex<SessionState>>,
        delay: Duration,
        status_display: Duration,
        handle: Handle,
    ) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            session,
            debouncer: Debouncer::new(delay, handle.clone()),
            pending_note: None,
            status: Arc::new(status),
            generation: Arc::new(AtomicU64::new(0)),
            status_display,
            handle,
        }
    }

    /// Records an edit; the commit fires after the quiet period.
    pub fn on_edit(&mut self, buffer: EditorBuffer) {
        let committer = self.committer();
        self.pending_note = Some(buffer.note_id.clone());
        self.debouncer.schedule(move || committer.commit(buffer));
    }

    /// Commits a pending edit immediately. Returns `true` if one was pending.
    pub fn flush(&mut self) -> bool {
        self.pending_note = None;
        self.debouncer.flush()
    }

    /// Drops a pending edit without committing it.
    pub fn cancel(&mut self) {
        self.pending_note = None;
        self.debouncer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Note targeted by the edit still waiting for its quiet period.
    pub fn pending_note_id(&self) -> Option<&str> {
        self.pending_note
            .as_deref()
            .filter(|_| self.debouncer.is_pending())
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    /// Subscribes to save status changes.
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    fn committer(&self) -> Committer {
        Committer {
            session: Arc::clone(&self.session),
            status: Arc::clone(&self.status),
            generation: Arc::clone(&self.generation),
            status_display: self.status_display,
            handle: self.handle.clone(),
        }
    }
}

struct Committer {
    session: Arc<Mutex<SessionState>>,
    status: Arc<watch::Sender<SaveStatus>>,
    generation: Arc<AtomicU64>,
    status_display: Duration,
    handle: Handle,
}

impl Committer {
    fn commit(self, buffer: EditorBuffer) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.send_replace(SaveStatus::Saving);

        let outcome = {
            let mut state = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            state.commit_buffer(&buffer)
        };
        debug!(
            "event=autosave_commit module=autosave status={:?} note_id={}",
            outcome, buffer.note_id
        );

        match outcome {
            CommitOutcome::Saved => {
                self.status.send_replace(SaveStatus::Saved);
                self.schedule_idle(generation);
            }
            CommitOutcome::NoteMissing => {
                self.status.send_replace(SaveStatus::Idle);
            }
            CommitOutcome::PersistFailed { quota_exceeded } => {
                self.status
                    .send_replace(SaveStatus::Failed { quota_exceeded });
            }
        }
    }

    fn schedule_idle(&self, generation: u64) {
        let status = Arc::clone(&self.status);
        let latest = Arc::clone(&self.generation);
        let display = self.status_display;
        self.handle.spawn(async move {
            tokio::time::sleep(display).await;
            if latest.load(Ordering::SeqCst) == generation {
                status.send_if_modified(|current| {
                    if *current == SaveStatus::Saved {
                        *current = SaveStatus::Idle;
                        true
                    } else {
                        false
                    }
                });
            }
        });
    }
}
