//! Completion-service client errors.

use thiserror::Error;

/// Errors raised by an [`AiClient`](super::AiClient) implementation.
#[derive(Error, Debug)]
pub enum AiError {
    /// API key not configured for the selected provider.
    #[error("API key for {0} not found")]
    ApiKeyNotFound(String),

    /// The service answered with a non-success status.
    #[error("Completion API request failed: {0}")]
    ApiRequestFailed(String),

    /// The response body did not have the expected shape.
    #[error("Invalid response format from completion API: {0}")]
    InvalidResponseFormat(String),

    /// Network connectivity error.
    #[error("Network error: {0}")]
    NetworkError(String),
}

// Note: anyhow already has a blanket impl for thiserror::Error types
