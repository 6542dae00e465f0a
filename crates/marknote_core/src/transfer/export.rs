//! Export formats.
//!
//! # Responsibility
//! - Full-collection JSON backup in the persistence schema.
//! - Single-note plain text and Markdown-with-frontmatter renderings.
//! - Bulk export of non-archived notes as entries or one document.
//!
//! Packaging entries into an archive file is left to the caller.

use crate::model::note::Note;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Replacement for Markdown images in plain-text exports.
pub const IMAGE_PLACEHOLDER: &str = "[Image]";

const DOCUMENT_SEPARATOR: &str = "\n\n----------------------------------------\n\n";
const MAX_FILE_STEM_CHARS: usize = 80;

static MARKDOWN_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*]\(([^)]+)\)").expect("valid image regex"));
static UNSAFE_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]+"#).expect("valid filename regex"));

/// Per-note export rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Markdown => "md",
        }
    }

    pub fn render(self, note: &Note) -> String {
        match self {
            Self::Text => export_text(note),
            Self::Markdown => export_markdown(note),
        }
    }
}

/// One file of a bulk export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub file_name: String,
    pub body: String,
}

/// Full-collection backup. Same schema as the persisted note list.
pub fn export_json(notes: &[Note]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(notes)
}

/// Plain-text rendering: underlined title, timestamps, tags, body.
pub fn export_text(note: &Note) -> String {
    let mut out = String::new();
    out.push_str(&note.title);
    out.push('\n');
    out.push_str(&"=".repeat(note.title.chars().count().max(1)));
    out.push_str("\n\n");
    out.push_str(&format!("Created: {}\n", display_timestamp(note.created_at)));
    out.push_str(&format!("Updated: {}\n", display_timestamp(note.updated_at)));
    if !note.tags.is_empty() {
        let tags: Vec<String> = note.tags.iter().map(|tag| format!("#{tag}")).collect();
        out.push_str(&format!("Tags: {}\n", tags.join(", ")));
    }
    out.push('\n');
    out.push_str(&strip_images(&note.content));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Markdown rendering with a metadata frontmatter block.
pub fn export_markdown(note: &Note) -> String {
    let tags: Vec<String> = note.tags.iter().map(|tag| quote(tag)).collect();
    let mut out = String::from("---\n");
    out.push_str(&format!("title: {}\n", quote(&note.title)));
    out.push_str(&format!("created: {}\n", iso_timestamp(note.created_at)));
    out.push_str(&format!("updated: {}\n", iso_timestamp(note.updated_at)));
    out.push_str(&format!("tags: [{}]\n", tags.join(", ")));
    out.push_str(&format!("starred: {}\n", note.starred));
    out.push_str(&format!("archived: {}\n", note.archived));
    out.push_str("---\n\n");
    out.push_str(&note.content);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// One entry per non-archived note, with unique file names.
pub fn export_entries(notes: &[Note], format: ExportFormat) -> Vec<ExportEntry> {
    let mut used = HashSet::new();
    notes
        .iter()
        .filter(|note| !note.archived)
        .map(|note| ExportEntry {
            file_name: unique_file_name(&note.title, format.extension(), &mut used),
            body: format.render(note),
        })
        .collect()
}

/// All non-archived notes concatenated into one document.
pub fn export_concatenated(notes: &[Note], format: ExportFormat) -> String {
    notes
        .iter()
        .filter(|note| !note.archived)
        .map(|note| format.render(note))
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

/// Replaces Markdown image syntax with [`IMAGE_PLACEHOLDER`].
pub fn strip_images(content: &str) -> String {
    MARKDOWN_IMAGE_RE
        .replace_all(content, IMAGE_PLACEHOLDER)
        .into_owned()
}

/// File-system-safe stem derived from a note title.
pub fn file_stem(title: &str) -> String {
    let cleaned = UNSAFE_FILENAME_RE.replace_all(title.trim(), "_");
    let stem: String = cleaned
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .chars()
        .take(MAX_FILE_STEM_CHARS)
        .collect();
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

fn unique_file_name(title: &str, extension: &str, used: &mut HashSet<String>) -> String {
    let stem = file_stem(title);
    let mut candidate = format!("{stem}.{extension}");
    let mut counter = 2;
    while !used.insert(candidate.to_lowercase()) {
        candidate = format!("{stem} ({counter}).{extension}");
        counter += 1;
    }
    candidate
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

fn display_timestamp(ms: i64) -> String {
    utc(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn iso_timestamp(ms: i64) -> String {
    utc(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::{file_stem, strip_images};

    #[test]
    fn strip_images_replaces_every_image() {
        let content = "a ![x](img_1) b ![](data:image/png;base64,AA) c";
        assert_eq!(strip_images(content), "a [Image] b [Image] c");
    }

    #[test]
    fn file_stem_removes_path_characters() {
        assert_eq!(file_stem("a/b: c?"), "a_b_ c_");
        assert_eq!(file_stem("  ...  "), "untitled");
    }
}
