//! Commit event data model.

use std::path::Path;

use chrono::{DateTime, FixedOffset};

use super::SHORT_HASH_LEN;

/// One changed file of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path relative to the repository root.
    pub path: String,
    /// Patch text when the source already carries it; `None` means it must be
    /// fetched through a [`DiffExtractor`](super::DiffExtractor).
    pub diff: Option<String>,
}

impl FileChange {
    /// Creates a change whose diff is fetched later.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            diff: None,
        }
    }

    /// Creates a change with its diff already known.
    pub fn with_diff(path: impl Into<String>, diff: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            diff: Some(diff.into()),
        }
    }

    /// Extension of the path including the leading dot, e.g. `".py"`.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.path)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"))
    }
}

/// A single commit to review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    /// Full commit hash.
    pub id: String,
    /// Commit message as written by the author.
    pub message: String,
    /// Address the report is sent to.
    pub author_email: String,
    /// Author timestamp, when the source provides one.
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Changed files, added before modified.
    pub changed_files: Vec<FileChange>,
}

impl CommitEvent {
    /// Abbreviated commit hash used in subjects and file names.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(SHORT_HASH_LEN) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }
}
