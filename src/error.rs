//! Error taxonomy for the review pipeline.
//!
//! Each failure class is contained at a different level: configuration errors
//! stop the process, payload errors reject one request, analysis and staging
//! errors degrade one file, and delivery errors fail one commit.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Missing or invalid configuration, detected once at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent from both the environment and the settings file.
    #[error("Missing required configuration value: {0}")]
    Missing(String),

    /// A key is present but its value cannot be used.
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// Configuration key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Malformed or empty webhook body. Answered with HTTP 400.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadValidationError {
    /// The body is not a JSON document of the expected shape.
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(String),

    /// `commits` is missing or empty.
    #[error("No commits found in the payload")]
    NoCommits,

    /// A commit entry lacks a required field.
    #[error("Commit {index} is malformed: {reason}")]
    MalformedCommit {
        /// Position of the commit in the `commits` array.
        index: usize,
        /// Missing or invalid field.
        reason: String,
    },
}

/// Completion service failure for one file. Recovered by degrading the result.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Network, HTTP or decoding failure.
    #[error("Completion request failed: {0}")]
    Request(String),

    /// The call did not finish within its deadline.
    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with nothing to parse.
    #[error("Completion returned no usable content")]
    EmptyResponse,
}

/// Staging I/O failure. Fatal to one attachment only.
#[derive(Error, Debug)]
pub enum StagingError {
    /// Could not create the transient file.
    #[error("Failed to create staging file in {}: {source}", dir.display())]
    Create {
        /// Staging directory.
        dir: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Could not write content to the transient file.
    #[error("Failed to write staging file: {0}")]
    Write(#[source] io::Error),

    /// Could not read the transient file back.
    #[error("Failed to read staging file: {0}")]
    Read(#[source] io::Error),

    /// Could not delete the transient file.
    #[error("Failed to remove staging file: {0}")]
    Remove(#[source] io::Error),
}

/// Email delivery failure for one report.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// A sender or recipient address does not parse.
    #[error("Invalid email address '{address}': {reason}")]
    InvalidAddress {
        /// The offending address.
        address: String,
        /// Parser message.
        reason: String,
    },

    /// The message could not be assembled.
    #[error("Failed to build email message: {0}")]
    Build(String),

    /// The transport failed before the provider accepted the message.
    #[error("Mail transport failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("Mail provider rejected message: HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        body: String,
    },
}

/// Outcome of a webhook request that did not end in delivery.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// The request body was rejected; nothing was processed.
    #[error(transparent)]
    Payload(#[from] PayloadValidationError),

    /// At least one report could not be delivered.
    #[error("{failed} of {attempted} reports could not be delivered: {first}")]
    Delivery {
        /// Commits whose report failed.
        failed: usize,
        /// Commits processed.
        attempted: usize,
        /// First delivery failure.
        first: DeliveryError,
    },
}
