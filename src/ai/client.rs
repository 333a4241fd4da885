use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::{ChatCompletionRequest, ChatCompletionResponse, Message};
use crate::api::{check_base_url, read_limited_text, ReadError};
use crate::config::Config;

const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB

#[derive(Debug, Error)]
pub enum AiError {
    #[error("No AI API key configured (set OPENAI_API_KEY or ai_api_key in config.toml)")]
    MissingApiKey,
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Model returned no content")]
    EmptyCompletion,
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

impl From<ReadError> for AiError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Network(e) => AiError::Network(e.without_url()),
            ReadError::TooLarge(limit) => AiError::ResponseTooLarge(limit),
            ReadError::InvalidUtf8 => AiError::InvalidUtf8,
        }
    }
}

/// `{"error": {"message": "..."}}` as sent by OpenAI-compatible services.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: Option<SecretString>,
    model: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let endpoint = check_base_url(base_url)
            .ok()
            .and_then(|base| base.join("v1/chat/completions").ok())
            .ok_or(AiError::InsecureBaseUrl)?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            model: model.into(),
            timeout,
        })
    }

    pub fn from_config(http: reqwest::Client, config: &Config) -> Result<Self, AiError> {
        Self::new(
            http,
            &config.ai_base_url,
            config.ai_api_key(),
            config.ai_model.clone(),
            config.request_timeout(),
        )
    }

    /// Send one completion request and return the decoded response.
    ///
    /// Non-success statuses become errors; whether the choices hold any
    /// usable text is left to the caller.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        let key = self.api_key.as_ref().ok_or(AiError::MissingApiKey)?;

        tracing::debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        // The timeout covers the body as well as the headers
        let fetch = async {
            let response = self
                .http
                .post(self.endpoint.clone())
                .bearer_auth(key.expose_secret())
                .json(request)
                .send()
                .await?;
            let status = response.status();
            let body = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
            Ok::<_, AiError>((status, body))
        };
        let (status, body) = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| AiError::Timeout(self.timeout.as_secs()))??;

        if !status.is_success() {
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
                return Err(AiError::Api {
                    status: status.as_u16(),
                    message: envelope.error.message,
                });
            }
            return Err(AiError::HttpStatus(status.as_u16()));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                id = %parsed.id,
                total_tokens = usage.total_tokens,
                "Chat completion received"
            );
        }
        Ok(parsed)
    }

    /// Build a request for this client's model.
    pub(crate) fn request(
        &self,
        messages: Vec<Message>,
        max_tokens: u32,
        temperature: f32,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature,
        }
    }
}
