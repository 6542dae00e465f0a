//! Bounded undo/redo history of note snapshots.
//!
//! # Responsibility
//! - Record pre-edit snapshots of the active note.
//! - Apply snapshots back through the repository on undo/redo.
//!
//! # Invariants
//! - Each undo stack holds at most `limit` entries; oldest are evicted first.
//! - A new snapshot clears the matching redo stack (linear history).
//! - Undo/redo only ever write `title` and `content`.
//!
//! With [`HistoryScope::Global`] one pair of stacks serves every note, so a
//! snapshot taken on note A can be popped while note B is active. The popped
//! snapshot is applied to the note it was taken from, and the opposite stack
//! records that same note, so a redo restores what the undo replaced.
//! [`HistoryScope::PerNote`] keeps one pair per note id and avoids that
//! cross-note interaction.
//!
//! Snapshot timestamps come from the caller or the repository clock.

use crate::model::note::{Note, NoteId, NotePatch, Snapshot};
use crate::repo::note_repo::NoteRepository;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default number of undo entries kept per stack.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// How undo history is partitioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryScope {
    /// One undo/redo pair shared by every note.
    Global,
    /// One undo/redo pair per note id.
    #[default]
    PerNote,
}

#[derive(Debug, Default)]
struct HistoryStacks {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
}

/// Undo/redo state machine.
#[derive(Debug)]
pub struct HistoryManager {
    scope: HistoryScope,
    limit: usize,
    global: HistoryStacks,
    per_note: HashMap<NoteId, HistoryStacks>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HistoryScope::default(), DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryManager {
    pub fn new(scope: HistoryScope, limit: usize) -> Self {
        Self {
            scope,
            limit: limit.max(1),
            global: HistoryStacks::default(),
            per_note: HashMap::new(),
        }
    }

    pub fn scope(&self) -> HistoryScope {
        self.scope
    }

    /// Pushes a snapshot of `note` taken at `taken_at` and clears forward
    /// history.
    pub fn snapshot_for_undo(&mut self, note: &Note, taken_at: i64) {
        let limit = self.limit;
        let stacks = self.stacks_mut(&note.id);
        stacks.undo.push_back(Snapshot::of(note, taken_at));
        while stacks.undo.len() > limit {
            stacks.undo.pop_front();
        }
        stacks.redo.clear();
    }

    /// Number of undo steps available while `active_id` is active.
    pub fn undo_depth(&self, active_id: &str) -> usize {
        self.stacks(active_id).map_or(0, |stacks| stacks.undo.len())
    }

    /// Number of redo steps available while `active_id` is active.
    pub fn redo_depth(&self, active_id: &str) -> usize {
        self.stacks(active_id).map_or(0, |stacks| stacks.redo.len())
    }

    /// Reverts the most recent snapshot. No-op without an active note or
    /// without history.
    pub fn undo(&mut self, repo: &mut NoteRepository, active_id: Option<&str>) -> Option<Snapshot> {
        self.step(repo, active_id, Direction::Undo)
    }

    /// Re-applies the most recently undone snapshot.
    pub fn redo(&mut self, repo: &mut NoteRepository, active_id: Option<&str>) -> Option<Snapshot> {
        self.step(repo, active_id, Direction::Redo)
    }

    /// Drops per-note history for a deleted note.
    pub fn forget(&mut self, note_id: &str) {
        self.per_note.remove(note_id);
    }

    pub fn clear(&mut self) {
        self.global = HistoryStacks::default();
        self.per_note.clear();
    }

    fn step(
        &mut self,
        repo: &mut NoteRepository,
        active_id: Option<&str>,
        direction: Direction,
    ) -> Option<Snapshot> {
        let active_id = active_id?;
        repo.find_by_id(active_id)?;
        let taken_at = repo.now_ms();
        let limit = self.limit;
        let stacks = self.stacks_mut(active_id);

        let target = match direction {
            Direction::Undo => stacks.undo.pop_back()?,
            Direction::Redo => stacks.redo.pop()?,
        };
        let Some(note) = repo.find_by_id(&target.note_id) else {
            debug!(
                "event=history_step module=history status=skipped reason=note_missing note_id={}",
                target.note_id
            );
            return None;
        };
        let current = Snapshot::of(note, taken_at);

        match direction {
            Direction::Undo => stacks.redo.push(current),
            Direction::Redo => {
                stacks.undo.push_back(current);
                while stacks.undo.len() > limit {
                    stacks.undo.pop_front();
                }
            }
        }

        repo.update(
            &target.note_id,
            NotePatch::editor(target.title.clone(), target.content.clone()),
        );
        debug!(
            "event=history_step module=history status=ok direction={} note_id={}",
            direction.label(),
            target.note_id
        );
        Some(target)
    }

    fn stacks(&self, note_id: &str) -> Option<&HistoryStacks> {
        match self.scope {
            HistoryScope::Global => Some(&self.global),
            HistoryScope::PerNote => self.per_note.get(note_id),
        }
    }

    fn stacks_mut(&mut self, note_id: &str) -> &mut HistoryStacks {
        match self.scope {
            HistoryScope::Global => &mut self.global,
            HistoryScope::PerNote => self.per_note.entry(note_id.to_string()).or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

