//! JSON backup import with last-write-wins merge.
//!
//! # Invariants
//! - The whole payload is parsed and validated before any merge step, so a
//!   malformed file never partially mutates the collection.
//! - An imported record whose id exists replaces the existing one wholly.
//! - Records are merged as whole JSON objects; unknown keys are kept.

use crate::model::note::Note;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Counts reported after a successful import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub merged: usize,
}

/// Import validation failure.
#[derive(Debug)]
pub enum ImportError {
    /// Payload is not valid JSON.
    Parse(serde_json::Error),
    /// Top-level value is not an array.
    NotAnArray,
    /// One array element is not a usable note record.
    InvalidRecord { index: usize, message: String },
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "import file is not valid JSON: {err}"),
            Self::NotAnArray => write!(f, "import file must contain an array of notes"),
            Self::InvalidRecord { index, message } => {
                write!(f, "invalid note record at index {index}: {message}")
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// Parses and validates an import payload.
pub fn parse_import(json: &str) -> Result<Vec<Note>, ImportError> {
    let value: Value = serde_json::from_str(json).map_err(ImportError::Parse)?;
    let Value::Array(items) = value else {
        return Err(ImportError::NotAnArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_record(index, item))
        .collect()
}

fn parse_record(index: usize, item: Value) -> Result<Note, ImportError> {
    let has_id = item
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        return Err(ImportError::InvalidRecord {
            index,
            message: "missing non-empty string `id`".to_string(),
        });
    }

    serde_json::from_value(item).map_err(|err| ImportError::InvalidRecord {
        index,
        message: err.to_string(),
    })
}

/// Merges `incoming` into `existing` in place.
///
/// Matching ids are replaced, new ids appended. Sorting is left to the
/// repository, which re-sorts before persisting.
pub fn merge_notes(existing: &mut Vec<Note>, incoming: Vec<Note>) -> ImportSummary {
    let mut positions: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(index, note)| (note.id.clone(), index))
        .collect();
    let mut summary = ImportSummary::default();

    for note in incoming {
        match positions.get(&note.id) {
            Some(&index) => {
                existing[index] = note;
                summary.merged += 1;
            }
            None => {
                positions.insert(note.id.clone(), existing.len());
                existing.push(note);
                summary.added += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::{merge_notes, parse_import, ImportError};
    use crate::model::note::Note;

    #[test]
    fn rejects_non_array_and_bad_json() {
        assert!(matches!(parse_import("{}"), Err(ImportError::NotAnArray)));
        assert!(matches!(parse_import("[{"), Err(ImportError::Parse(_))));
    }

    #[test]
    fn rejects_records_without_id() {
        let err = parse_import(r#"[{"id":"ok"},{"title":"no id"}]"#).unwrap_err();
        assert!(matches!(err, ImportError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn duplicate_ids_inside_one_import_merge_with_each_other() {
        let mut existing = Vec::new();
        let summary = merge_notes(&mut existing, vec![Note::new("x", 1), Note::new("x", 2)]);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.merged, 1);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].updated_at, 2);
    }
}
