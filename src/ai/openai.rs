//! OpenAI-compatible chat completion client (Groq, OpenAI, Ollama).

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AiClient, AiClientMetadata, AiError};

/// Chat completion request message.
#[derive(Serialize, Debug)]
struct Message {
    role: String,
    content: String,
}

/// Chat completion request body.
#[derive(Serialize, Debug)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

/// Chat completion response choice.
#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

/// Chat completion response message.
#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion response.
#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// OpenAI-compatible API client.
pub struct OpenAiAiClient {
    /// HTTP client for API requests.
    client: Client,
    /// Provider name reported in metadata and logs.
    provider: String,
    /// Model identifier.
    model: String,
    /// API key for authentication (optional for Ollama).
    api_key: Option<String>,
    /// Service root, e.g. "https://api.groq.com/openai".
    base_url: String,
    /// Maximum tokens for responses.
    max_tokens: u32,
    /// Sampling temperature.
    temperature: f64,
}

impl OpenAiAiClient {
    /// Creates a new OpenAI-compatible API client.
    pub fn new(
        client: Client,
        provider: String,
        model: String,
        api_key: Option<String>,
        base_url: String,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self {
            client,
            provider,
            model,
            api_key,
            base_url,
            max_tokens,
            temperature,
        }
    }

    fn get_api_url(&self) -> String {
        let url = super::endpoint_url(&self.base_url, "/v1/chat/completions");
        debug!(base_url = %self.base_url, full_url = %url, "Constructed chat completion URL");
        url
    }
}

impl AiClient for OpenAiAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut messages = Vec::with_capacity(2);
            if !system_prompt.is_empty() {
                messages.push(Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                });
            }
            messages.push(Message {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            });

            let request = OpenAiRequest {
                model: self.model.clone(),
                messages,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                stream: false,
            };

            let api_url = self.get_api_url();
            info!(
                url = %api_url,
                provider = %self.provider,
                model = %self.model,
                user_prompt_len = user_prompt.len(),
                "Sending chat completion request"
            );

            let mut req_builder = self.client.post(&api_url).json(&request);
            if let Some(ref api_key) = self.api_key {
                req_builder = req_builder.bearer_auth(api_key);
            }

            let response = req_builder
                .send()
                .await
                .map_err(|e| AiError::NetworkError(e.to_string()))?;
            let response = super::check_error_response(response).await?;

            let openai_response: OpenAiResponse = response
                .json()
                .await
                .map_err(|e| AiError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                choice_count = openai_response.choices.len(),
                model = ?openai_response.model,
                usage = ?openai_response.usage,
                "Received chat completion response"
            );

            let result = openai_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| {
                    AiError::InvalidResponseFormat("No message content in response".to_string())
                        .into()
                });

            super::log_response_success(&self.provider, &result);
            result
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: self.provider.clone(),
            model: self.model.clone(),
            max_response_length: self.max_tokens as usize,
        }
    }
}
