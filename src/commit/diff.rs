//! Patch retrieval for one file of one commit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use git2::{DiffFormat, DiffOptions, Repository};
use tracing::{debug, warn};

/// Produces the patch text for a file in a commit.
///
/// Never fails: when nothing can be extracted the result is a placeholder, so
/// analysis degrades to a generic review instead of aborting the commit.
pub trait DiffExtractor: Send + Sync {
    /// Returns the patch for `file_path` in `commit_id`.
    fn diff_for(&self, commit_id: &str, file_path: &str) -> String;
}

/// Placeholder used when no patch text is available.
pub fn placeholder_diff(file_path: &str) -> String {
    format!("// Changes in {file_path}\n(diff unavailable)\n")
}

/// Reads patches from a local git repository.
pub struct GitDiffExtractor {
    repo_path: PathBuf,
}

impl GitDiffExtractor {
    /// Uses the repository containing `repo_path`.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Patch of `commit_id` against its first parent, optionally limited to one path.
    fn patch(&self, commit_id: &str, file_path: Option<&str>) -> Result<String> {
        let repo = Repository::discover(&self.repo_path).with_context(|| {
            format!("Not in a git repository: {}", self.repo_path.display())
        })?;
        let commit = repo
            .revparse_single(commit_id)
            .with_context(|| format!("Failed to find commit: {commit_id}"))?
            .peel_to_commit()
            .context("Failed to peel object to commit")?;

        let commit_tree = commit.tree().context("Failed to get commit tree")?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(
                commit
                    .parent(0)
                    .context("Failed to get parent commit")?
                    .tree()
                    .context("Failed to get parent tree")?,
            )
        } else {
            None
        };

        let mut options = DiffOptions::new();
        if let Some(path) = file_path {
            options.pathspec(path).disable_pathspec_match(true);
        }

        let diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), Some(&mut options))
            .context("Failed to create diff")?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            let content = std::str::from_utf8(line.content()).unwrap_or("<binary>");
            match line.origin() {
                origin @ ('+' | '-' | ' ') => patch.push(origin),
                _ => {}
            }
            patch.push_str(content);
            true
        })
        .context("Failed to format diff")?;

        Ok(patch)
    }
}

impl DiffExtractor for GitDiffExtractor {
    fn diff_for(&self, commit_id: &str, file_path: &str) -> String {
        match self.patch(commit_id, Some(file_path)) {
            Ok(patch) if !patch.trim().is_empty() => return patch,
            Ok(_) => debug!(commit = commit_id, path = file_path, "Empty per-file diff"),
            Err(e) => {
                warn!(
                    commit = commit_id,
                    path = file_path,
                    error = %format!("{e:#}"),
                    "Diff extraction failed, using placeholder"
                );
                return placeholder_diff(file_path);
            }
        }

        // Per-file lookup found nothing; fall back to the whole commit.
        match self.patch(commit_id, None) {
            Ok(patch) if !patch.trim().is_empty() => patch,
            _ => placeholder_diff(file_path),
        }
    }
}
