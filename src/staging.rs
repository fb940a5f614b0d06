//! Attachment staging.
//!
//! Turns corrected code into an [`Attachment`]. In memory mode the buffer is
//! built directly; in disk mode the content takes a round trip through a
//! uniquely named transient file that is removed before `stage` returns, on
//! success and on every error path.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::config::StagingMode;
use crate::error::StagingError;

/// Media type of every attachment.
pub const ATTACHMENT_MEDIA_TYPE: &str = "text/plain";

/// A file attached to a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// Raw content.
    pub content: Vec<u8>,
    /// MIME type.
    pub media_type: String,
}

impl Attachment {
    /// Builds a `text/plain` attachment.
    pub fn text(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            media_type: ATTACHMENT_MEDIA_TYPE.to_string(),
        }
    }

    /// Content encoded for the mail wire format.
    pub fn base64_content(&self) -> String {
        STANDARD.encode(&self.content)
    }
}

/// Attachment name for a file of a commit: `corrected_<path>_<short id><ext>`.
///
/// Path separators and other unsafe characters become `_`, so files sharing
/// a basename in different directories get different names.
pub fn attachment_filename(short_id: &str, file_path: &str, extension: &str) -> String {
    let sanitized: String = file_path
        .trim_start_matches(['/', '.'])
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    };
    format!("corrected_{sanitized}_{short_id}{extension}")
}

/// Materializes attachment content.
#[derive(Debug, Clone)]
pub struct ArtifactStager {
    mode: StagingMode,
    dir: PathBuf,
}

impl ArtifactStager {
    /// Creates a stager; `dir` is only used in disk mode.
    pub fn new(mode: StagingMode, dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            dir: dir.into(),
        }
    }

    /// Stager that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::new(StagingMode::Memory, std::env::temp_dir())
    }

    /// Builds the attachment for `file_path` of commit `short_id`.
    pub fn stage(
        &self,
        short_id: &str,
        file_path: &str,
        extension: &str,
        content: &str,
    ) -> Result<Attachment, StagingError> {
        let filename = attachment_filename(short_id, file_path, extension);
        let bytes = match self.mode {
            StagingMode::Memory => content.as_bytes().to_vec(),
            StagingMode::Disk => self.round_trip(&filename, content)?,
        };
        Ok(Attachment::text(filename, bytes))
    }

    /// Writes, reads back and deletes a transient file.
    fn round_trip(&self, filename: &str, content: &str) -> Result<Vec<u8>, StagingError> {
        // Dropping `file` on any early return removes it from disk.
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{filename}."))
            .suffix(".staged")
            .tempfile_in(&self.dir)
            .map_err(|source| StagingError::Create {
                dir: self.dir.clone(),
                source,
            })?;

        file.write_all(content.as_bytes())
            .and_then(|()| file.flush())
            .map_err(StagingError::Write)?;

        let bytes = fs::read(file.path()).map_err(StagingError::Read)?;
        debug!(path = %file.path().display(), bytes = bytes.len(), "Staged artifact");

        file.close().map_err(StagingError::Remove)?;
        Ok(bytes)
    }
}
