//! Anthropic Messages API client.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AiClient, AiClientMetadata, AiError};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude API request message.
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Claude API request body.
#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    system: String,
    messages: Vec<Message>,
}

/// Claude API response content block.
#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Claude API response.
#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

/// Claude API client implementation.
pub struct ClaudeAiClient {
    /// HTTP client for API requests.
    client: Client,
    /// Model identifier.
    model: String,
    /// API key for authentication.
    api_key: String,
    /// Service root, normally "https://api.anthropic.com".
    base_url: String,
    /// Maximum tokens for responses.
    max_tokens: u32,
    /// Sampling temperature.
    temperature: f64,
}

impl ClaudeAiClient {
    /// Creates a new Claude AI client.
    pub fn new(
        client: Client,
        model: String,
        api_key: String,
        base_url: String,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self {
            client,
            model,
            api_key,
            base_url,
            max_tokens,
            temperature,
        }
    }
}

impl AiClient for ClaudeAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = ClaudeRequest {
                model: self.model.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                system: system_prompt.to_string(),
                messages: vec![Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                }],
            };

            let url = super::endpoint_url(&self.base_url, "/v1/messages");
            info!(
                url = %url,
                model = %self.model,
                max_tokens = self.max_tokens,
                "Sending request to Claude API"
            );

            let response = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&request)
                .send()
                .await
                .map_err(|e| AiError::NetworkError(e.to_string()))?;
            let response = super::check_error_response(response).await?;

            let claude_response: ClaudeResponse = response
                .json()
                .await
                .map_err(|e| AiError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                block_count = claude_response.content.len(),
                "Received Claude API response"
            );

            let text: Vec<String> = claude_response
                .content
                .into_iter()
                .filter(|c| c.content_type == "text")
                .map(|c| c.text)
                .collect();

            let result = if text.is_empty() {
                Err(AiError::InvalidResponseFormat("No text content in response".to_string()).into())
            } else {
                Ok(text.join(""))
            };

            super::log_response_success("Claude", &result);
            result
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "Anthropic".to_string(),
            model: self.model.clone(),
            max_response_length: self.max_tokens as usize,
        }
    }
}
