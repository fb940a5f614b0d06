//! Commit sources: webhook payloads, CI event files and the local HEAD.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use git2::{Delta, Repository};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{CommitEvent, FileChange};
use crate::error::PayloadValidationError;

/// Anything that yields commit events.
pub trait CommitSource {
    /// Error raised when the source cannot be read.
    type Error;

    /// Returns the commits to review, oldest first as provided by the source.
    fn collect(&self) -> Result<Vec<CommitEvent>, Self::Error>;
}

/// Push event body, e.g. a GitHub `push` webhook.
#[derive(Deserialize)]
struct PushPayload {
    #[serde(default)]
    commits: Option<Vec<serde_json::Value>>,
}

/// One entry of the `commits` array.
#[derive(Deserialize)]
struct PushCommit {
    id: String,
    message: String,
    author: PushAuthor,
    #[serde(default)]
    timestamp: Option<DateTime<FixedOffset>>,
    added: Vec<String>,
    modified: Vec<String>,
}

#[derive(Deserialize)]
struct PushAuthor {
    email: String,
}

impl PushCommit {
    fn into_event(self, index: usize) -> Result<CommitEvent, PayloadValidationError> {
        if self.id.trim().is_empty() {
            return Err(PayloadValidationError::MalformedCommit {
                index,
                reason: "empty `id`".to_string(),
            });
        }
        if self.author.email.trim().is_empty() {
            return Err(PayloadValidationError::MalformedCommit {
                index,
                reason: "empty `author.email`".to_string(),
            });
        }

        let changed_files = self
            .added
            .into_iter()
            .chain(self.modified)
            .map(FileChange::new)
            .collect();

        Ok(CommitEvent {
            id: self.id,
            message: self.message,
            author_email: self.author.email,
            timestamp: self.timestamp,
            changed_files,
        })
    }
}

/// Parses a push event body into commit events.
///
/// A missing, `null` or empty `commits` array is rejected, as is any entry
/// lacking `id`, `message`, `author.email`, `added` or `modified`.
pub fn parse_push_payload(body: &[u8]) -> Result<Vec<CommitEvent>, PayloadValidationError> {
    let payload: PushPayload = serde_json::from_slice(body)
        .map_err(|e| PayloadValidationError::InvalidJson(e.to_string()))?;

    let commits = payload
        .commits
        .filter(|commits| !commits.is_empty())
        .ok_or(PayloadValidationError::NoCommits)?;

    commits
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<PushCommit>(value)
                .map_err(|e| PayloadValidationError::MalformedCommit {
                    index,
                    reason: e.to_string(),
                })?
                .into_event(index)
        })
        .collect()
}

/// Webhook body held in memory.
pub struct WebhookSource<'a> {
    body: &'a [u8],
}

impl<'a> WebhookSource<'a> {
    /// Wraps a raw request body.
    pub fn new(body: &'a [u8]) -> Self {
        Self { body }
    }
}

impl CommitSource for WebhookSource<'_> {
    type Error = PayloadValidationError;

    fn collect(&self) -> Result<Vec<CommitEvent>, Self::Error> {
        parse_push_payload(self.body)
    }
}

/// Push event document written by the CI system (e.g. `GITHUB_EVENT_PATH`).
pub struct EventFileSource {
    path: PathBuf,
}

impl EventFileSource {
    /// Reads the event document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CommitSource for EventFileSource {
    type Error = anyhow::Error;

    fn collect(&self) -> Result<Vec<CommitEvent>> {
        let body = fs::read(&self.path)
            .with_context(|| format!("Failed to read event file: {}", self.path.display()))?;

        match parse_push_payload(&body) {
            Ok(commits) => {
                info!(
                    path = %self.path.display(),
                    count = commits.len(),
                    "Loaded commits from event file"
                );
                Ok(commits)
            }
            // Non-push events (manual dispatch, tags) carry no commits.
            Err(PayloadValidationError::NoCommits) => {
                warn!(path = %self.path.display(), "Event file contains no commits");
                Ok(Vec::new())
            }
            Err(e) => Err(e).with_context(|| {
                format!("Invalid event file: {}", self.path.display())
            }),
        }
    }
}

/// HEAD commit of a local repository.
pub struct LocalHeadSource {
    repo_path: PathBuf,
}

impl LocalHeadSource {
    /// Inspects the repository containing `repo_path`.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }
}

impl CommitSource for LocalHeadSource {
    type Error = anyhow::Error;

    fn collect(&self) -> Result<Vec<CommitEvent>> {
        let repo = Repository::discover(&self.repo_path).with_context(|| {
            format!("Not in a git repository: {}", self.repo_path.display())
        })?;
        let head = repo.head().context("Failed to get HEAD reference")?;
        let commit = head
            .peel_to_commit()
            .context("Failed to peel HEAD to commit")?;

        let author = commit.author();
        let author_email = author
            .email()
            .filter(|email| !email.trim().is_empty())
            .context("HEAD commit has no author email")?
            .to_string();

        let when = author.when();
        let timestamp = DateTime::from_timestamp(when.seconds(), 0).and_then(|utc| {
            FixedOffset::east_opt(when.offset_minutes() * 60).map(|tz| utc.with_timezone(&tz))
        });

        let changed_files = head_file_changes(&repo, &commit)?;
        debug!(
            commit = %commit.id(),
            files = changed_files.len(),
            "Inspected local HEAD"
        );

        Ok(vec![CommitEvent {
            id: commit.id().to_string(),
            message: commit.message().unwrap_or("").trim().to_string(),
            author_email,
            timestamp,
            changed_files,
        }])
    }
}

/// Lists added then modified paths of a commit against its first parent.
fn head_file_changes(repo: &Repository, commit: &git2::Commit) -> Result<Vec<FileChange>> {
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

    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)
        .context("Failed to create diff")?;

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for delta in diff.deltas() {
        let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) else {
            continue;
        };
        match delta.status() {
            Delta::Added | Delta::Copied | Delta::Renamed => added.push(FileChange::new(path)),
            Delta::Modified | Delta::Typechange => modified.push(FileChange::new(path)),
            _ => {}
        }
    }

    added.extend(modified);
    Ok(added)
}

/// Commit source for a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchTrigger {
    /// CI-provided push event document.
    EventFile(PathBuf),
    /// HEAD of the local repository.
    LocalHead(PathBuf),
}

impl BatchTrigger {
    /// Prefers the event file when one is given, else inspects `repo`.
    pub fn resolve(event_path: Option<PathBuf>, repo: &Path) -> Self {
        match event_path {
            Some(path) => Self::EventFile(path),
            None => Self::LocalHead(repo.to_path_buf()),
        }
    }
}

impl CommitSource for BatchTrigger {
    type Error = anyhow::Error;

    fn collect(&self) -> Result<Vec<CommitEvent>> {
        match self {
            Self::EventFile(path) => EventFileSource::new(path).collect(),
            Self::LocalHead(repo) => LocalHeadSource::new(repo).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PUSH: &str = r#"{
        "ref": "refs/heads/main",
        "commits": [
            {
                "id": "0123456789abcdef0123456789abcdef01234567",
                "message": "Add parser",
                "timestamp": "2024-05-01T10:00:00+02:00",
                "author": { "name": "Dev", "email": "dev@example.com" },
                "added": ["src/parser.py", "README.md"],
                "removed": [],
                "modified": ["src/app.js"]
            },
            {
                "id": "fedcba9876543210fedcba9876543210fedcba98",
                "message": "Tweak",
                "author": { "email": "other@example.com" },
                "added": [],
                "modified": []
            }
        ]
    }"#;

    #[test]
    fn parses_commits_with_added_before_modified() {
        let commits = parse_push_payload(PUSH.as_bytes()).unwrap();
        assert_eq!(commits.len(), 2);

        let first = &commits[0];
        assert_eq!(first.author_email, "dev@example.com");
        assert_eq!(first.message, "Add parser");
        let paths: Vec<&str> = first.changed_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["src/parser.py", "README.md", "src/app.js"]);
        assert!(first.changed_files.iter().all(|f| f.diff.is_none()));
        assert_eq!(
            first.timestamp.map(|t| t.to_rfc3339()).as_deref(),
            Some("2024-05-01T10:00:00+02:00")
        );

        assert!(commits[1].changed_files.is_empty());
        assert!(commits[1].timestamp.is_none());
    }

    #[test]
    fn missing_or_empty_commits_are_rejected() {
        for body in [r#"{}"#, r#"{"commits": []}"#, r#"{"commits": null}"#] {
            assert_eq!(
                parse_push_payload(body.as_bytes()),
                Err(PayloadValidationError::NoCommits),
                "{body}"
            );
        }
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            parse_push_payload(b"not json"),
            Err(PayloadValidationError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_push_payload(b"[1, 2]"),
            Err(PayloadValidationError::InvalidJson(_))
        ));
    }

    #[test]
    fn malformed_commit_reports_its_index() {
        let body = r#"{"commits": [
            {"id": "a", "message": "m", "author": {"email": "e@x"}, "added": [], "modified": []},
            {"id": "b", "message": "m", "author": {}, "added": [], "modified": []}
        ]}"#;
        match parse_push_payload(body.as_bytes()) {
            Err(PayloadValidationError::MalformedCommit { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("email"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn blank_author_email_is_rejected() {
        let body = r#"{"commits": [
            {"id": "a", "message": "m", "author": {"email": " "}, "added": [], "modified": []}
        ]}"#;
        assert!(matches!(
            parse_push_payload(body.as_bytes()),
            Err(PayloadValidationError::MalformedCommit { index: 0, .. })
        ));
    }

    #[test]
    fn webhook_source_collects() {
        let commits = WebhookSource::new(PUSH.as_bytes()).collect().unwrap();
        assert_eq!(commits[0].short_id(), "0123456");
    }

    #[test]
    fn event_file_without_commits_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        fs::write(&path, r#"{"action": "workflow_dispatch"}"#).unwrap();

        let commits = EventFileSource::new(&path).collect().unwrap();
        assert!(commits.is_empty());
    }

    #[test]
    fn event_file_is_parsed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        fs::write(&path, PUSH).unwrap();

        let commits = BatchTrigger::EventFile(path).collect().unwrap();
        assert_eq!(commits.len(), 2);
    }

    #[test]
    fn missing_event_file_is_an_error() {
        let err = EventFileSource::new("/definitely/not/here.json")
            .collect()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read event file"));
    }

    #[test]
    fn trigger_prefers_event_file() {
        let repo = Path::new(".");
        assert_eq!(
            BatchTrigger::resolve(Some(PathBuf::from("/tmp/e.json")), repo),
            BatchTrigger::EventFile(PathBuf::from("/tmp/e.json"))
        );
        assert_eq!(
            BatchTrigger::resolve(None, repo),
            BatchTrigger::LocalHead(PathBuf::from("."))
        );
    }
}
