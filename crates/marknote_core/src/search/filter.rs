//! Filtered note views.
//!
//! # Invariants
//! - Archived notes never appear in filtered views or the tag listing.
//! - Query and tag predicates compose by intersection.
//! - Output order follows the input (recency) order; there is no ranking.

use crate::model::note::Note;
use crate::service::tags::normalize_tag;
use std::collections::BTreeSet;

/// Active list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    /// Case-insensitive substring matched against title or content.
    pub query: String,
    /// Exact tag membership, already normalized.
    pub tag: Option<String>,
}

impl NoteFilter {
    pub fn new(query: impl Into<String>, tag: Option<&str>) -> Self {
        Self {
            query: query.into(),
            tag: tag.and_then(normalize_tag),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty() && self.tag.is_none()
    }

    /// Whether `note` passes this filter (archived notes never do).
    pub fn matches(&self, note: &Note) -> bool {
        if note.archived {
            return false;
        }

        let needle = self.query.trim().to_lowercase();
        if !needle.is_empty()
            && !note.title.to_lowercase().contains(&needle)
            && !note.content.to_lowercase().contains(&needle)
        {
            return false;
        }

        match self.tag.as_deref() {
            Some(tag) => note.tags.iter().any(|candidate| candidate == tag),
            None => true,
        }
    }
}

/// Returns notes passing `filter`, preserving input order.
pub fn filter_notes<'a>(notes: &'a [Note], filter: &NoteFilter) -> Vec<&'a Note> {
    notes.iter().filter(|note| filter.matches(note)).collect()
}

/// Union of tags across non-archived notes, sorted.
pub fn collect_tags(notes: &[Note]) -> Vec<String> {
    notes
        .iter()
        .filter(|note| !note.archived)
        .flat_map(|note| note.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
