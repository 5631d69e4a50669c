//! Services layer.
//!
//! Services sit between the application facade and the providers:
//!
//! ```text
//! App (state, events, user operations)
//!          |
//!          v
//!    Services Layer
//!          |
//!          v
//! Providers (completion endpoint, mail host), storage
//! ```
//!
//! - [`MailHostService`]: snapshots of the open item, writes back into the host
//! - [`build_prompt`]: maps a request descriptor onto model instructions
//! - [`CompletionClient`]: one prompt in, one text out
//! - [`ProcessingService`]: validation, single-flight execution, summaries
//! - [`ClipboardService`]: copy with fallback

mod clipboard_service;
mod completion_service;
mod mail_host_service;
mod processing_service;
mod prompt_builder;

pub use clipboard_service::{ClipboardError, ClipboardService, ClipboardSink, MemoryClipboard};
pub use completion_service::CompletionClient;
pub use mail_host_service::{text_to_html, HostStatus, MailHostService, DEFAULT_COMPOSE_PURPOSE};
pub use processing_service::{
    validate_content, ActionInput, ActionSource, ContentIssue, Output, Phase, ProcessingError,
    ProcessingService, SummaryOutcome, ERROR_MARKER, MIN_CONTENT_CHARS,
};
pub use prompt_builder::{build_prompt, SYSTEM_INSTRUCTION};
