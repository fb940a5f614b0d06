//! Completion service clients.
//!
//! The review pipeline treats the completion service as a black box: a system
//! prompt and a user prompt go in, free text comes out. Providers differ only
//! in wire format, so each lives behind the [`AiClient`] trait and is picked
//! from configuration by [`create_ai_client`].

pub mod claude;
pub mod error;
pub mod openai;

#[cfg(test)]
pub(crate) mod test_utils;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::config::{AiConfig, AiProvider};

pub use claude::ClaudeAiClient;
pub use error::AiError;
pub use openai::OpenAiAiClient;

/// Metadata about an AI client implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiClientMetadata {
    /// Service provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Maximum number of tokens requested per response.
    pub max_response_length: usize,
}

/// Trait for AI service clients.
pub trait AiClient: Send + Sync {
    /// Sends a request to the AI service and returns the raw response.
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Returns metadata about the AI client implementation.
    fn get_metadata(&self) -> AiClientMetadata;
}

/// Builds the client for the configured provider.
pub fn create_ai_client(config: &AiConfig) -> Result<Box<dyn AiClient>> {
    let http = build_http_client(config.request_timeout)?;
    let client: Box<dyn AiClient> = match config.provider {
        AiProvider::Claude => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| AiError::ApiKeyNotFound(config.provider.to_string()))?;
            Box::new(ClaudeAiClient::new(
                http,
                config.model.clone(),
                api_key,
                config.base_url.clone(),
                config.max_tokens,
                config.temperature,
            ))
        }
        AiProvider::Groq | AiProvider::OpenAi | AiProvider::Ollama => {
            Box::new(OpenAiAiClient::new(
                http,
                config.provider.to_string(),
                config.model.clone(),
                config.api_key.clone(),
                config.base_url.clone(),
                config.max_tokens,
                config.temperature,
            ))
        }
    };

    let metadata = client.get_metadata();
    tracing::info!(
        provider = %metadata.provider,
        model = %metadata.model,
        "Completion client ready"
    );
    Ok(client)
}

// ── Shared helpers for AI client implementations ────────────────────

/// Builds an HTTP client with the given request timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Joins a service root and an endpoint path without doubling slashes.
pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Checks an HTTP response for error status and returns a structured error
/// if non-success.
pub(crate) async fn check_error_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_else(|e| {
        tracing::debug!("Failed to read error response body: {e}");
        String::new()
    });
    Err(AiError::ApiRequestFailed(format!("HTTP {status}: {error_text}")).into())
}

/// Logs successful text extraction from an AI API response.
pub(crate) fn log_response_success(provider: &str, result: &Result<String>) {
    if let Ok(text) = result {
        tracing::debug!(
            response_len = text.len(),
            "Successfully extracted text content from {} API response",
            provider
        );
    }
}
