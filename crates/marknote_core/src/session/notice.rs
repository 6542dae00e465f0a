//! User-visible notifications raised by core operations.

use crate::store::metadata_store::PersistError;
use crate::transfer::import::{ImportError, ImportSummary};

/// Notification category; the render layer picks styling from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    QuotaExceeded,
    SaveFailed,
    ImportSucceeded,
    ImportFailed,
    ImageFailed,
}

/// One queued notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn persist_failure(err: &PersistError) -> Self {
        let kind = if err.is_quota_exceeded() {
            NoticeKind::QuotaExceeded
        } else {
            NoticeKind::SaveFailed
        };
        Self {
            kind,
            message: err.user_message().to_string(),
        }
    }

    pub fn imported(summary: ImportSummary) -> Self {
        Self {
            kind: NoticeKind::ImportSucceeded,
            message: format!(
                "Imported {} new note(s), updated {} existing note(s).",
                summary.added, summary.merged
            ),
        }
    }

    pub fn import_failed(err: &ImportError) -> Self {
        Self {
            kind: NoticeKind::ImportFailed,
            message: format!("Import failed: {err}"),
        }
    }

    pub fn image_failed() -> Self {
        Self {
            kind: NoticeKind::ImageFailed,
            message: "Could not save the image. Try a smaller file.".to_string(),
        }
    }
}
