//! Process-wide session state.
//!
//! # Responsibility
//! - Own the note repository, undo history, tabs, filter and preferences.
//! - Turn persistence failures into queued user notices.
//!
//! # Invariants
//! - `open_tabs` has no duplicates and only holds ids of existing notes.
//! - `active_id`, when set, is one of `open_tabs`.
//! - Every mutation runs to completion before the next one starts; callers
//!   share this value behind one lock.

use crate::model::note::{Note, NoteId, NotePatch, Snapshot};
use crate::repo::note_repo::NoteRepository;
use crate::search::filter::{collect_tags, filter_notes, NoteFilter};
use crate::service::autosave::EditorBuffer;
use crate::service::history::HistoryManager;
use crate::session::notice::Notice;
use crate::transfer::export::export_json;
use crate::transfer::import::{merge_notes, parse_import, ImportError, ImportSummary};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Preference key holding the theme.
pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Parses a stored value; anything unknown falls back to light.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "dark" => Self::Dark,
            _ => Self::Light,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Result of committing an editor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Saved,
    NoteMissing,
    PersistFailed { quota_exceeded: bool },
}

/// Session state owner.
pub struct SessionState {
    repo: NoteRepository,
    history: HistoryManager,
    active_id: Option<NoteId>,
    open_tabs: Vec<NoteId>,
    filter: NoteFilter,
    theme: Theme,
    is_online: bool,
    notices: Vec<Notice>,
}

impl SessionState {
    pub fn new(repo: NoteRepository, history: HistoryManager) -> Self {
        let theme = repo
            .preference(THEME_KEY)
            .map(|value| Theme::parse(&value))
            .unwrap_or_default();
        Self {
            repo,
            history,
            active_id: None,
            open_tabs: Vec::new(),
            filter: NoteFilter::default(),
            theme,
            is_online: true,
            notices: Vec::new(),
        }
    }

    pub fn notes(&self) -> &[Note] {
        self.repo.notes()
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.repo.find_by_id(id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.active_id.as_deref().and_then(|id| self.repo.find_by_id(id))
    }

    pub fn open_tabs(&self) -> &[NoteId] {
        &self.open_tabs
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn filter(&self) -> &NoteFilter {
        &self.filter
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filter.query = query.into();
    }

    pub fn set_tag_filter(&mut self, tag: Option<&str>) {
        self.filter = NoteFilter::new(std::mem::take(&mut self.filter.query), tag);
    }

    pub fn clear_filter(&mut self) {
        self.filter = NoteFilter::default();
    }

    /// Non-archived notes matching the active filter, most recent first.
    pub fn filtered_notes(&self) -> Vec<&Note> {
        filter_notes(self.repo.notes(), &self.filter)
    }

    /// Sorted tag union across non-archived notes.
    pub fn all_tags(&self) -> Vec<String> {
        collect_tags(self.repo.notes())
    }

    pub fn archived_notes(&self) -> Vec<&Note> {
        self.repo.notes().iter().filter(|note| note.archived).collect()
    }

    pub fn starred_notes(&self) -> Vec<&Note> {
        self.repo
            .notes()
            .iter()
            .filter(|note| note.starred && !note.archived)
            .collect()
    }

    /// Opens `id` in a tab (if not already open) and activates it.
    pub fn select_note(&mut self, id: &str) -> bool {
        if self.repo.find_by_id(id).is_none() {
            return false;
        }
        if !self.open_tabs.iter().any(|tab| tab == id) {
            self.open_tabs.push(id.to_string());
        }
        self.active_id = Some(id.to_string());
        true
    }

    /// Closes the tab for `id`. An active tab hands focus to the last
    /// remaining tab, or clears the active note.
    pub fn close_tab(&mut self, id: &str) -> bool {
        let before = self.open_tabs.len();
        self.open_tabs.retain(|tab| tab != id);
        if self.open_tabs.len() == before {
            return false;
        }
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.open_tabs.last().cloned();
        }
        true
    }

    /// Creates a note, opens it in a tab and activates it.
    pub fn create_note(&mut self) -> Note {
        let note = self.repo.create();
        self.record_persist_outcome();
        self.select_note(&note.id);
        note
    }

    pub fn update_note(&mut self, id: &str, patch: NotePatch) -> bool {
        let updated = self.repo.update(id, patch);
        self.record_persist_outcome();
        updated
    }

    /// Deletes a note, closing its tab and dropping its history.
    pub fn delete_note(&mut self, id: &str) -> bool {
        if !self.repo.delete(id) {
            return false;
        }
        self.record_persist_outcome();
        self.close_tab(id);
        self.history.forget(id);
        true
    }

    pub fn toggle_star(&mut self, id: &str) -> bool {
        let Some(starred) = self.repo.find_by_id(id).map(|note| note.starred) else {
            return false;
        };
        self.update_note(
            id,
            NotePatch {
                starred: Some(!starred),
                ..NotePatch::default()
            },
        )
    }

    pub fn toggle_archive(&mut self, id: &str) -> bool {
        let Some(archived) = self.repo.find_by_id(id).map(|note| note.archived) else {
            return false;
        };
        self.update_note(
            id,
            NotePatch {
                archived: Some(!archived),
                ..NotePatch::default()
            },
        )
    }

    pub fn set_cover_position(&mut self, id: &str, position: impl Into<String>) -> bool {
        self.update_note(
            id,
            NotePatch {
                cover_position: Some(position.into()),
                ..NotePatch::default()
            },
        )
    }

    /// Autosave commit body: snapshot the pre-commit state, then write the
    /// buffer's title and content.
    pub fn commit_buffer(&mut self, buffer: &EditorBuffer) -> CommitOutcome {
        let taken_at = self.repo.now_ms();
        let Some(current) = self.repo.find_by_id(&buffer.note_id) else {
            return CommitOutcome::NoteMissing;
        };
        self.history.snapshot_for_undo(current, taken_at);
        self.repo.update(
            &buffer.note_id,
            NotePatch::editor(buffer.title.clone(), buffer.content.clone()),
        );

        match self.record_persist_outcome() {
            Some(quota_exceeded) => CommitOutcome::PersistFailed { quota_exceeded },
            None => CommitOutcome::Saved,
        }
    }

    /// Pushes a snapshot of the active note without changing it.
    pub fn snapshot_active(&mut self) -> bool {
        let Some(active) = self.active_id.as_deref() else {
            return false;
        };
        let taken_at = self.repo.now_ms();
        let Some(note) = self.repo.find_by_id(active) else {
            return false;
        };
        self.history.snapshot_for_undo(note, taken_at);
        true
    }

    pub fn undo(&mut self) -> Option<Snapshot> {
        let applied = self
            .history
            .undo(&mut self.repo, self.active_id.as_deref());
        self.record_persist_outcome();
        applied
    }

    pub fn redo(&mut self) -> Option<Snapshot> {
        let applied = self
            .history
            .redo(&mut self.repo, self.active_id.as_deref());
        self.record_persist_outcome();
        applied
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Sets and persists the theme. The in-memory value wins even when the
    /// write fails.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        if let Err(err) = self.repo.set_preference(THEME_KEY, theme.as_str()) {
            warn!("event=pref_write module=session status=error key={THEME_KEY} error={err}");
            self.notices.push(Notice::persist_failure(&err));
        }
    }

    pub fn toggle_theme(&mut self) -> Theme {
        let next = self.theme.toggled();
        self.set_theme(next);
        next
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn set_online(&mut self, online: bool) {
        if self.is_online != online {
            info!("event=connectivity module=session status=ok online={online}");
        }
        self.is_online = online;
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub(crate) fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Saves the collection again after a failed save.
    pub fn retry_save(&mut self) -> bool {
        match self.repo.retry_persist() {
            Ok(()) => true,
            Err(err) => {
                self.notices.push(Notice::persist_failure(&err));
                false
            }
        }
    }

    /// Validates and merges a JSON backup. Nothing changes on failure.
    pub fn import_json(&mut self, json: &str) -> Result<ImportSummary, ImportError> {
        let incoming = match parse_import(json) {
            Ok(incoming) => incoming,
            Err(err) => {
                warn!("event=import module=session status=error error={err}");
                self.notices.push(Notice::import_failed(&err));
                return Err(err);
            }
        };

        let mut merged = self.repo.notes().to_vec();
        let summary = merge_notes(&mut merged, incoming);
        self.repo.replace_all(merged);
        self.record_persist_outcome();
        info!(
            "event=import module=session status=ok added={} merged={}",
            summary.added, summary.merged
        );
        self.notices.push(Notice::imported(summary));
        Ok(summary)
    }

    /// Full-collection backup in the persistence schema.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        export_json(self.repo.notes())
    }

    /// Moves a repository save failure into the notice queue.
    ///
    /// Returns `Some(quota_exceeded)` when the last save failed.
    fn record_persist_outcome(&mut self) -> Option<bool> {
        let err = self.repo.take_persist_error()?;
        let quota_exceeded = err.is_quota_exceeded();
        self.notices.push(Notice::persist_failure(&err));
        Some(quota_exceeded)
    }
}
