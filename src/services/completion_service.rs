//! Completion client: one prompt in, one text out.
//!
//! Wraps an [`LlmProvider`] with the fixed system instruction and the
//! sampling parameters used for business-style text.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use uuid::Uuid;

use super::prompt_builder::SYSTEM_INSTRUCTION;
use crate::config::CompletionSettings;
use crate::providers::ai::{
    CompletionRequest, LlmProvider, LlmResult, Message, OpenAiCompatibleProvider,
};

const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: usize = 1000;

/// Issues single-shot completions against the configured provider.
///
/// The provider can be swapped at runtime, e.g. after the user enters an
/// API key.
pub struct CompletionClient {
    provider: RwLock<Arc<dyn LlmProvider>>,
    temperature: f32,
    max_tokens: usize,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider: RwLock::new(provider),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Builds a client for an OpenAI-compatible endpoint.
    pub fn from_settings(settings: &CompletionSettings, api_key: Option<String>) -> Self {
        let provider = OpenAiCompatibleProvider::from_settings(settings, api_key);
        Self::new(Arc::new(provider)).with_sampling(settings.temperature, settings.max_tokens)
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Replaces the underlying provider.
    pub fn replace_provider(&self, provider: Arc<dyn LlmProvider>) {
        *self
            .provider
            .write()
            .unwrap_or_else(PoisonError::into_inner) = provider;
    }

    fn provider(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.provider.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Whether a completion can be attempted at all.
    pub fn is_configured(&self) -> bool {
        self.provider().is_configured()
    }

    /// Sends `prompt` as the user turn and returns the trimmed reply text.
    ///
    /// An empty reply is returned as an empty string.
    pub async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let provider = self.provider();
        let request_id = Uuid::new_v4();
        let request = CompletionRequest::new(vec![Message::user(prompt)])
            .with_system_prompt(SYSTEM_INSTRUCTION)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        tracing::debug!(
            %request_id,
            provider = provider.name(),
            model = provider.model(),
            prompt_chars = prompt.chars().count(),
            "Sending completion request"
        );
        let started = Instant::now();

        match provider.complete(&request).await {
            Ok(response) => {
                tracing::info!(
                    %request_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    total_tokens = response.tokens_used.total_tokens,
                    finish_reason = ?response.finish_reason,
                    "Completion finished"
                );
                if response.text.trim().is_empty() {
                    tracing::warn!(%request_id, "Completion returned no content");
                }
                Ok(response.text.trim().to_string())
            }
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "Completion failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ai::{CompletionResponse, FinishReason, LlmError, Role, TokenUsage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockProvider {
        configured: bool,
        reply: Mutex<Option<LlmResult<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockProvider {
        fn replying(text: &str) -> Self {
            Self {
                configured: true,
                reply: Mutex::new(Some(Ok(text.to_string()))),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(error: LlmError) -> Self {
            Self {
                configured: true,
                reply: Mutex::new(Some(Err(error))),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, request: &CompletionRequest) -> LlmResult<CompletionResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let text = self.reply.lock().unwrap().take().expect("single call")?;
            Ok(CompletionResponse {
                text,
                tokens_used: TokenUsage::default(),
                finish_reason: FinishReason::Stop,
            })
        }
    }

    #[tokio::test]
    async fn sends_system_instruction_and_prompt() {
        let provider = Arc::new(MockProvider::replying("  Antwort \n"));
        let client = CompletionClient::new(provider.clone()).with_sampling(0.4, 500);

        let text = client.complete("Fasse zusammen").await.unwrap();
        assert_eq!(text, "Antwort");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.system_prompt.as_deref(), Some(SYSTEM_INSTRUCTION));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "Fasse zusammen");
        assert_eq!(request.temperature, 0.4);
        assert_eq!(request.max_tokens, Some(500));
    }

    #[tokio::test]
    async fn empty_reply_is_surfaced_as_empty() {
        let client = CompletionClient::new(Arc::new(MockProvider::replying("")));
        assert_eq!(client.complete("x").await.unwrap(), "");
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let client = CompletionClient::new(Arc::new(MockProvider::failing(LlmError::ApiError {
            status: 500,
            message: "boom".to_string(),
        })));

        let err = client.complete("x").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn replace_provider_updates_configuration() {
        let client = CompletionClient::from_settings(&CompletionSettings::default(), None);
        assert!(!client.is_configured());

        client.replace_provider(Arc::new(MockProvider::replying("ok")));
        assert!(client.is_configured());
    }
}
