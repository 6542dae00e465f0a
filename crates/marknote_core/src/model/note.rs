//! Note domain model.
//!
//! # Responsibility
//! - Define the persisted note record and its JSON wire shape.
//! - Define the shallow patch applied by repository updates.
//! - Define undo/redo snapshots as owned value copies.
//!
//! # Invariants
//! - `id` is assigned once at creation and never rewritten.
//! - `tags` is derived from `content` and never edited independently.
//! - Unknown JSON keys survive load/save and import untouched.
//!
//! # See also
//! - `crate::repo::note_repo` for timestamp and tag maintenance.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Opaque note identifier (timestamp + random suffix).
pub type NoteId = String;

/// Title used whenever a note would otherwise be saved with an empty title.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Cover position used when a note has none set.
pub const DEFAULT_COVER_POSITION: &str = "center";

/// Persisted note record.
///
/// Serialized as camelCase JSON to match the metadata/import schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    /// Raw markdown source. Source of truth for `tags`.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Epoch milliseconds, fixed at creation.
    #[serde(default)]
    pub created_at: i64,
    /// Epoch milliseconds, bumped on every mutation.
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub starred: bool,
    /// Image store key, or a legacy inline `data:` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_position: Option<String>,
    /// Inline image key -> presence marker. Payloads live in the image store.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, Value>,
    /// Keys this version does not know about, written back verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    /// Creates an empty note stamped with `now_ms` for both timestamps.
    pub fn new(id: impl Into<NoteId>, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.to_string(),
            content: String::new(),
            tags: Vec::new(),
            created_at: now_ms,
            updated_at: now_ms,
            archived: false,
            starred: false,
            cover_image: None,
            cover_position: None,
            images: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Returns the effective cover position.
    pub fn cover_position(&self) -> &str {
        self.cover_position
            .as_deref()
            .unwrap_or(DEFAULT_COVER_POSITION)
    }

    /// Returns whether `key` is registered as an inline image of this note.
    pub fn has_image(&self, key: &str) -> bool {
        self.images.contains_key(key)
    }

    /// Applies a shallow patch. Returns `true` when `content` was part of it.
    ///
    /// Timestamps and tags are left to the caller, which owns the clock and
    /// the tag derivation rule.
    pub fn apply_patch(&mut self, patch: NotePatch) -> bool {
        if let Some(title) = patch.title {
            self.title = normalize_title(title);
        }
        let content_changed = patch.content.is_some();
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(archived) = patch.archived {
            self.archived = archived;
        }
        if let Some(starred) = patch.starred {
            self.starred = starred;
        }
        if let Some(cover_image) = patch.cover_image {
            self.cover_image = cover_image;
        }
        if let Some(cover_position) = patch.cover_position {
            self.cover_position = Some(cover_position);
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        content_changed
    }
}

/// Shallow partial update for one note.
///
/// `None` means "leave untouched". `cover_image: Some(None)` clears the cover.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub archived: Option<bool>,
    pub starred: Option<bool>,
    pub cover_image: Option<Option<String>>,
    pub cover_position: Option<String>,
    pub images: Option<BTreeMap<String, Value>>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Patch written by the editor: title and content together.
    pub fn editor(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Point-in-time copy of a note's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub note_id: NoteId,
    pub title: String,
    pub content: String,
    pub timestamp: i64,
}

impl Snapshot {
    pub fn of(note: &Note, timestamp: i64) -> Self {
        Self {
            note_id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            timestamp,
        }
    }
}

/// Image store record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub data_url: String,
    pub timestamp: i64,
}

/// Returns `title`, or [`DEFAULT_TITLE`] when it is blank.
pub fn normalize_title(title: String) -> String {
    if title.trim().is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

/// Generates a note id: base36 timestamp followed by a random suffix.
///
/// Uniqueness is probabilistic, which is acceptable for single-device use.
pub fn generate_note_id(now_ms: i64) -> NoteId {
    format!("{}{}", to_base36(now_ms.max(0) as u64), random_suffix(8))
}

/// Generates an image store key.
pub fn generate_image_id(now_ms: i64) -> String {
    format!("img_{}_{}", now_ms.max(0), random_suffix(9))
}

/// Returns whether a cover reference is a legacy inline data URL.
pub fn is_inline_data_url(reference: &str) -> bool {
    reference.starts_with("data:")
}

fn random_suffix(len: usize) -> String {
    Uuid::new_v4().simple().to_string().chars().take(len).collect()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{generate_note_id, normalize_title, to_base36, Note, NotePatch, DEFAULT_TITLE};

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn generated_ids_share_timestamp_prefix_but_differ() {
        let first = generate_note_id(1_700_000_000_000);
        let second = generate_note_id(1_700_000_000_000);
        assert_ne!(first, second);
        assert_eq!(&first[..8], &second[..8]);
    }

    #[test]
    fn blank_title_normalizes_to_default() {
        assert_eq!(normalize_title("   ".to_string()), DEFAULT_TITLE);
        assert_eq!(normalize_title("Plan".to_string()), "Plan");
    }

    #[test]
    fn apply_patch_reports_content_presence() {
        let mut note = Note::new("n1", 10);
        assert!(!note.apply_patch(NotePatch::title("x")));
        assert!(note.apply_patch(NotePatch::content("body")));
        assert_eq!(note.title, "x");
        assert_eq!(note.content, "body");
    }
}
