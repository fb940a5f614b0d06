//! Commit review orchestration.
//!
//! The [`Orchestrator`] turns one [`CommitEvent`] into one delivered
//! [`EmailReport`]. Failures are contained at the smallest unit: a file whose
//! analysis fails is reported with a degraded result, a file whose attachment
//! cannot be staged is reported without one, and a commit whose report cannot
//! be delivered does not stop the rest of the batch.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ai::create_ai_client;
use crate::analysis::parser::DEFAULT_EXTENSION;
use crate::analysis::{AnalysisEngine, AnalysisResult};
use crate::commit::{
    parse_push_payload, placeholder_diff, CommitEvent, DiffExtractor, FileChange, GitDiffExtractor,
};
use crate::config::{CommitScope, Config, PipelineConfig};
use crate::error::{DeliveryError, WebhookError};
use crate::notify::{analysis_section, create_notifier, EmailReport, Notifier, DELIVERY_TIMEOUT};
use crate::staging::{ArtifactStager, Attachment};

/// Short hash used for the `/test-email` report.
const TEST_COMMIT_ID: &str = "1234567";

/// Reviewed file before it is folded into a report.
#[derive(Debug, Clone)]
pub struct FileReview {
    /// Path inside the repository.
    pub path: String,
    /// Patch text the review was based on.
    pub diff: String,
    /// Parsed or degraded verdict.
    pub result: AnalysisResult,
    /// Extension of the path, if any.
    path_extension: Option<String>,
}

impl FileReview {
    /// Attachment extension: the detected language's, else the path's, else `.txt`.
    pub fn attachment_extension(&self) -> &str {
        if self.result.extension != DEFAULT_EXTENSION {
            &self.result.extension
        } else {
            self.path_extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
        }
    }

    /// Attachment body: the corrected code, or the diff when there is none.
    pub fn attachment_content(&self) -> &str {
        if self.result.corrected_code.trim().is_empty() {
            &self.diff
        } else {
            &self.result.corrected_code
        }
    }
}

/// Result of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Commits whose report was delivered.
    pub delivered: usize,
    /// Commits whose report could not be delivered.
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivered {}, failed {}", self.delivered, self.failed)
    }
}

/// Sequences diff extraction, analysis, staging and delivery for commits.
pub struct Orchestrator {
    engine: AnalysisEngine,
    diffs: Arc<dyn DiffExtractor>,
    stager: ArtifactStager,
    notifier: Arc<dyn Notifier>,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Assembles an orchestrator from its collaborators.
    pub fn new(
        engine: AnalysisEngine,
        diffs: Arc<dyn DiffExtractor>,
        stager: ArtifactStager,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            engine,
            diffs,
            stager,
            notifier,
            config,
        }
    }

    /// Builds the production collaborators from configuration.
    ///
    /// Diffs are read from the repository containing `repo_path`.
    pub async fn from_config(config: &Config, repo_path: &Path) -> Result<Self> {
        let client = create_ai_client(&config.ai).context("Failed to create AI client")?;

        let notifier: Arc<dyn Notifier> =
            Arc::from(create_notifier(&config.mail, DELIVERY_TIMEOUT)?);
        if let Err(e) = notifier.verify().await {
            warn!(
                transport = notifier.name(),
                error = %e,
                "Mail transport verification failed, continuing"
            );
        }

        let pipeline = config.pipeline.clone();
        Ok(Self::new(
            AnalysisEngine::new(client, pipeline.analysis_timeout),
            Arc::new(GitDiffExtractor::new(repo_path)),
            ArtifactStager::new(pipeline.staging_mode, pipeline.staging_dir.clone()),
            notifier,
            pipeline,
        ))
    }

    /// Analyzes every changed file of `commit` and assembles its report.
    ///
    /// Never fails. Attachments follow `changed_files` order even when files
    /// are analyzed concurrently.
    pub async fn build_report(&self, commit: &CommitEvent) -> EmailReport {
        let deadline = Instant::now() + self.config.commit_timeout;
        // Futures are inert until polled; `buffered` still bounds how many run.
        let pending: Vec<_> = commit
            .changed_files
            .iter()
            .map(|file| self.review_file(commit, file, deadline))
            .collect();
        let reviews: Vec<FileReview> = stream::iter(pending)
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut analysis = String::new();
        let mut attachments: Vec<Attachment> = Vec::with_capacity(reviews.len());
        let mut names = HashSet::new();
        for review in &reviews {
            analysis.push_str(&analysis_section(&review.path, &review.result.explanation));

            let extension = review.attachment_extension();
            match self.stager.stage(
                commit.short_id(),
                &review.path,
                extension,
                review.attachment_content(),
            ) {
                Ok(mut attachment) => {
                    attachment.filename = unique_filename(&mut names, attachment.filename, extension);
                    attachments.push(attachment);
                }
                Err(e) => warn!(
                    commit = %commit.id,
                    path = %review.path,
                    error = %e,
                    "Staging failed, reporting file without attachment"
                ),
            }
        }

        EmailReport::for_commit(commit, &analysis, attachments)
    }

    async fn review_file(
        &self,
        commit: &CommitEvent,
        file: &FileChange,
        deadline: Instant,
    ) -> FileReview {
        let diff = match &file.diff {
            Some(diff) => diff.clone(),
            None => self.fetch_diff(&commit.id, &file.path).await,
        };

        let outcome = self
            .engine
            .analyze_before(&commit.message, &diff, deadline)
            .await;
        if let Err(e) = &outcome {
            warn!(
                commit = %commit.id,
                path = %file.path,
                error = %e,
                "Analysis failed, using degraded result"
            );
        }
        let result = AnalysisResult::from_outcome(outcome);
        debug!(
            path = %file.path,
            language = %result.detected_language,
            has_code = !result.corrected_code.is_empty(),
            "File reviewed"
        );

        FileReview {
            path: file.path.clone(),
            path_extension: file.extension(),
            diff,
            result,
        }
    }

    async fn fetch_diff(&self, commit_id: &str, path: &str) -> String {
        let diffs = Arc::clone(&self.diffs);
        let (id, file) = (commit_id.to_string(), path.to_string());
        match tokio::task::spawn_blocking(move || diffs.diff_for(&id, &file)).await {
            Ok(diff) => diff,
            Err(e) => {
                warn!(commit = commit_id, path, error = %e, "Diff task failed");
                placeholder_diff(path)
            }
        }
    }

    /// Reviews one commit and mails the report to its author.
    pub async fn process_commit(&self, commit: &CommitEvent) -> Result<(), DeliveryError> {
        info!(
            commit = %commit.id,
            author = %commit.author_email,
            files = commit.changed_files.len(),
            "Processing commit"
        );
        let report = self.build_report(commit).await;

        match self.notifier.deliver(&report).await {
            Ok(()) => {
                info!(
                    commit = %commit.id,
                    attachments = report.attachments.len(),
                    "Report sent"
                );
                Ok(())
            }
            Err(e) => {
                error!(commit = %commit.id, error = %e, "Report delivery failed");
                Err(e)
            }
        }
    }

    /// Processes every commit in order; a failed delivery does not stop the batch.
    pub async fn run_batch(&self, commits: &[CommitEvent]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for commit in commits {
            match self.process_commit(commit).await {
                Ok(()) => summary.delivered += 1,
                Err(_) => summary.failed += 1,
            }
        }
        info!(
            delivered = summary.delivered,
            failed = summary.failed,
            "Batch finished"
        );
        summary
    }

    /// Handles a push webhook body.
    ///
    /// Processes the first commit or all of them depending on the configured
    /// scope. Returns the number of reports delivered.
    pub async fn handle_webhook(&self, body: &[u8]) -> Result<usize, WebhookError> {
        let commits = parse_push_payload(body)?;
        let selected = match self.config.commit_scope {
            CommitScope::First => &commits[..1],
            CommitScope::All => &commits[..],
        };
        debug!(
            received = commits.len(),
            selected = selected.len(),
            "Webhook accepted"
        );

        let mut first_failure = None;
        let mut failed = 0;
        for commit in selected {
            if let Err(e) = self.process_commit(commit).await {
                failed += 1;
                first_failure.get_or_insert(e);
            }
        }

        match first_failure {
            None => Ok(selected.len()),
            Some(first) => Err(WebhookError::Delivery {
                failed,
                attempted: selected.len(),
                first,
            }),
        }
    }

    /// Sends a fixed report with one staged attachment to `recipient`.
    pub async fn send_test_email(&self, recipient: &str) -> Result<(), DeliveryError> {
        let commit = CommitEvent {
            id: TEST_COMMIT_ID.to_string(),
            message: "Test commit".to_string(),
            author_email: recipient.to_string(),
            timestamp: None,
            changed_files: Vec::new(),
        };

        let mut attachment = self
            .stager
            .stage(
                TEST_COMMIT_ID,
                "test_file.txt",
                DEFAULT_EXTENSION,
                "Test attachment content",
            )
            .map_err(|e| DeliveryError::Build(e.to_string()))?;
        attachment.filename = "test_file.txt".to_string();

        let report = EmailReport::for_commit(
            &commit,
            &analysis_section("test_file.txt", "Test analysis content for debugging."),
            vec![attachment],
        );
        self.notifier.deliver(&report).await?;
        info!(to = recipient, "Test email sent");
        Ok(())
    }
}

/// Returns `name`, or `name` with a `-2`, `-3`, ... suffix before `extension`
/// when it was already used in this report.
fn unique_filename(used: &mut HashSet<String>, name: String, extension: &str) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let stem = name.strip_suffix(extension).unwrap_or(&name).to_string();
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}{extension}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
