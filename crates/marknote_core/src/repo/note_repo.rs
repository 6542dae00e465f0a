//! In-memory note collection backed by a metadata store.
//!
//! # Responsibility
//! - Own the note collection held in memory.
//! - Provide create/update/delete/lookup with tag derivation.
//! - Persist the full collection as the final step of every mutation.
//!
//! # Invariants
//! - After any mutation the collection is sorted by `updated_at DESC`.
//! - `update` recomputes tags only when `content` is part of the patch.
//! - Timestamps handed out by one repository are strictly increasing.
//! - A failed save never rolls back memory; memory stays authoritative.

use crate::clock::{Clock, SystemClock};
use crate::model::note::{generate_note_id, Note, NoteId, NotePatch};
use crate::service::tags::extract_tags;
use crate::store::metadata_store::{MetadataStore, PersistError, PersistResult};
use log::{info, warn};

/// Default key the note collection is stored under.
pub const NOTES_KEY: &str = "notes";

/// Note collection owner.
pub struct NoteRepository {
    notes: Vec<Note>,
    store: Box<dyn MetadataStore>,
    notes_key: String,
    clock: Box<dyn Clock>,
    last_timestamp: i64,
    persist_error: Option<PersistError>,
}

impl NoteRepository {
    /// Loads the collection stored under [`NOTES_KEY`] using the system clock.
    pub fn load(store: Box<dyn MetadataStore>) -> Self {
        Self::load_with(store, NOTES_KEY, Box::new(SystemClock))
    }

    /// Loads the collection stored under `notes_key` with an explicit clock.
    pub fn load_with(
        store: Box<dyn MetadataStore>,
        notes_key: impl Into<String>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let notes_key = notes_key.into();
        let mut notes = store.load_notes(&notes_key);
        sort_by_recency(&mut notes);
        let last_timestamp = notes.iter().map(|note| note.updated_at).max().unwrap_or(0);
        info!(
            "event=notes_load module=repo status=ok count={}",
            notes.len()
        );

        Self {
            notes,
            store,
            notes_key,
            clock,
            last_timestamp,
            persist_error: None,
        }
    }

    /// All notes, most recently updated first.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Pure lookup by id.
    pub fn find_by_id(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    /// Creates an empty note at the front of the collection and persists.
    pub fn create(&mut self) -> Note {
        let now = self.next_timestamp();
        let note = Note::new(generate_note_id(now), now);
        self.notes.insert(0, note.clone());
        info!("event=note_create module=repo status=ok note_id={}", note.id);
        self.persist();
        note
    }

    /// Shallow-merges `patch` into note `id`.
    ///
    /// Returns `false` when the id is unknown. Tags are recomputed only when
    /// the patch carries `content`.
    pub fn update(&mut self, id: &str, patch: NotePatch) -> bool {
        let now = self.next_timestamp();
        let Some(note) = self.notes.iter_mut().find(|note| note.id == id) else {
            return false;
        };

        if note.apply_patch(patch) {
            note.tags = extract_tags(&note.content);
        }
        note.updated_at = now;

        sort_by_recency(&mut self.notes);
        self.persist();
        true
    }

    /// Removes note `id`. Returns `false` when it does not exist.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        if self.notes.len() == before {
            return false;
        }
        info!("event=note_delete module=repo status=ok note_id={id}");
        self.persist();
        true
    }

    /// Replaces the whole collection (import path), re-sorts and persists.
    pub fn replace_all(&mut self, notes: Vec<Note>) {
        self.notes = notes;
        sort_by_recency(&mut self.notes);
        if let Some(max) = self.notes.iter().map(|note| note.updated_at).max() {
            self.last_timestamp = self.last_timestamp.max(max);
        }
        self.persist();
    }

    /// Takes the failure of the most recent save, if it failed.
    pub fn take_persist_error(&mut self) -> Option<PersistError> {
        self.persist_error.take()
    }

    /// Saves the collection again, e.g. after the user freed space.
    pub fn retry_persist(&mut self) -> PersistResult<()> {
        self.persist_error = None;
        self.store.save_notes(&self.notes_key, &self.notes)
    }

    /// Reads a preference value from the backing store.
    pub fn preference(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!("event=pref_read module=repo status=error key={key} error={err}");
                None
            }
        }
    }

    /// Writes a preference value to the backing store.
    pub fn set_preference(&mut self, key: &str, value: &str) -> PersistResult<()> {
        self.store.set(key, value)
    }

    /// Ids of all notes, in collection order.
    pub fn ids(&self) -> Vec<NoteId> {
        self.notes.iter().map(|note| note.id.clone()).collect()
    }

    /// Current time from the repository clock, without the monotonic bump.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn next_timestamp(&mut self) -> i64 {
        let now = self.clock.now_ms().max(self.last_timestamp + 1);
        self.last_timestamp = now;
        now
    }

    fn persist(&mut self) {
        match self.store.save_notes(&self.notes_key, &self.notes) {
            Ok(()) => self.persist_error = None,
            Err(err) => {
                warn!(
                    "event=notes_save module=repo status=error quota_exceeded={} count={} error={err}",
                    err.is_quota_exceeded(),
                    self.notes.len()
                );
                self.persist_error = Some(err);
            }
        }
    }
}

/// Stable sort by `updated_at` descending.
pub fn sort_by_recency(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
