//! AI/LLM provider implementations.
//!
//! This module provides a unified interface for chat-completion endpoints.
//! Only single-shot completions are supported.
//!
//! # Example
//!
//! ```rust,no_run
//! use mailaider::providers::ai::{
//!     CompletionRequest, LlmProvider, Message, OpenAiCompatibleProvider,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAiCompatibleProvider::custom(
//!     "https://api.perplexity.ai",
//!     Some("pplx-...".to_string()),
//!     "llama-3.1-sonar-small-128k-online",
//! );
//!
//! let request = CompletionRequest::new(vec![Message::user("Fasse diese E-Mail zusammen.")])
//!     .with_system_prompt("Du bist ein professioneller E-Mail-Assistent.");
//!
//! let response = provider.complete(&request).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

mod openai;
mod traits;

pub use openai::OpenAiCompatibleProvider;
pub use traits::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, LlmResult,
    Message, Role, TokenUsage,
};
