//! OpenAI-compatible provider implementation.
//!
//! Works with Perplexity, OpenAI, Azure-style deployments (API-key header)
//! and any other endpoint exposing `/chat/completions`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::traits::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, LlmResult,
    Message, Role, TokenUsage,
};
use crate::config::CompletionSettings;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// OpenAI API request format.
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: match msg.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: msg.content.clone(),
        }
    }
}

/// OpenAI API response format. Every level is optional: a missing content
/// field is an empty completion, not an error.
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    message: Option<OpenAiResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

/// How the API key is attached to requests.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthScheme {
    Bearer,
    ApiKeyHeader(String),
}

/// Provider for OpenAI-compatible chat-completion APIs.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    auth: AuthScheme,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatibleProvider {
    /// Creates a provider for a custom endpoint.
    pub fn custom(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            auth: AuthScheme::Bearer,
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a provider from the completion settings and an optional key.
    pub fn from_settings(settings: &CompletionSettings, api_key: Option<String>) -> Self {
        let mut provider = Self::custom(&settings.base_url, api_key, &settings.model)
            .with_timeout(Duration::from_secs(settings.timeout_secs));
        if let Some(ref header) = settings.api_key_header {
            provider = provider.with_api_key_header(header);
        }
        provider
    }

    /// Sends the key in the named header instead of `Authorization: Bearer`.
    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.auth = AuthScheme::ApiKeyHeader(header.into());
        self
    }

    /// Sets the client-side request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the API key.
    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.api_key = api_key;
    }

    /// Overrides the HTTP client (useful for proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let Some(ref api_key) = self.api_key else {
            return headers;
        };

        match &self.auth {
            AuthScheme::Bearer => {
                if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", api_key)) {
                    headers.insert(AUTHORIZATION, value);
                }
            }
            AuthScheme::ApiKeyHeader(name) => {
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(api_key),
                ) {
                    headers.insert(name, value);
                }
            }
        }

        headers
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAiRequest {
        let mut messages: Vec<OpenAiMessage> = Vec::new();

        if let Some(ref system) = request.system_prompt {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(OpenAiMessage::from));

        OpenAiRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::HttpError(error)
        }
    }

    fn parse_response(body: &str) -> LlmResult<CompletionResponse> {
        let api_response: OpenAiResponse = serde_json::from_str(body)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let choice = api_response.choices.into_iter().next();
        let finish_reason = choice
            .as_ref()
            .and_then(|c| c.finish_reason.as_deref())
            .map(|r| Self::parse_finish_reason(Some(r)))
            .unwrap_or(FinishReason::Other);
        let text = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        let tokens_used = api_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            tokens_used,
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
            && self
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }

    async fn complete(&self, request: &CompletionRequest) -> LlmResult<CompletionResponse> {
        if !self.is_configured() {
            return Err(LlmError::NotConfigured("missing API key".to_string()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(request);

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        Self::parse_response(&text)
    }
}
