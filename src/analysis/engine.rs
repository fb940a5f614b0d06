//! Completion calls for code review.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ai::AiClient;
use crate::error::AnalysisError;

/// System prompt sent with every review request.
pub const SYSTEM_PROMPT: &str = "You are a senior developer reviewing code changes. \
Review the commit and propose corrections where they are needed. \
Begin your answer with a line of the form `Language: <name>` naming the \
programming language of the changed file. Put the complete corrected code in a \
single fenced code block, then explain each change in plain prose.";

/// Builds the user prompt for one file.
pub fn user_prompt(commit_message: &str, diff: &str) -> String {
    format!("Analyze this commit:\nMessage: {commit_message}\nChanges:\n{diff}")
}

/// Sends review requests to the completion service.
pub struct AnalysisEngine {
    client: Box<dyn AiClient>,
    timeout: Duration,
}

impl AnalysisEngine {
    /// Wraps a client; each call is bounded by `timeout`.
    pub fn new(client: Box<dyn AiClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Reviews one diff and returns the raw completion text.
    pub async fn analyze(&self, commit_message: &str, diff: &str) -> Result<String, AnalysisError> {
        self.analyze_before(commit_message, diff, Instant::now() + self.timeout)
            .await
    }

    /// Like [`analyze`](Self::analyze), but also gives up at `deadline`.
    pub async fn analyze_before(
        &self,
        commit_message: &str,
        diff: &str,
        deadline: Instant,
    ) -> Result<String, AnalysisError> {
        let started = Instant::now();
        let deadline = deadline.min(started + self.timeout);
        let prompt = user_prompt(commit_message, diff);

        let outcome =
            tokio::time::timeout_at(deadline, self.client.send_request(SYSTEM_PROMPT, &prompt))
                .await;

        match outcome {
            Err(_) => {
                let waited = started.elapsed();
                warn!(waited_ms = waited.as_millis() as u64, "Completion request timed out");
                Err(AnalysisError::Timeout(waited))
            }
            Ok(Err(e)) => {
                warn!(error = %format!("{e:#}"), "Completion request failed");
                Err(AnalysisError::Request(format!("{e:#}")))
            }
            Ok(Ok(text)) if text.trim().is_empty() => {
                warn!("Completion returned an empty response");
                Err(AnalysisError::EmptyResponse)
            }
            Ok(Ok(text)) => {
                debug!(response_len = text.len(), "Completion received");
                Ok(text)
            }
        }
    }
}
