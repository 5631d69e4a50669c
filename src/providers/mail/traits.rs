//! Capability interface over the host mail client's object model.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a mail host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("mail host unavailable: {0}")]
    Unavailable(String),

    #[error("mail host not ready after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("failed to read item: {0}")]
    Read(String),

    #[error("failed to write item: {0}")]
    Write(String),

    #[error("no draft is active")]
    NotComposing,

    #[error("reply form is not available while composing")]
    NotReading,
}

/// Result type for mail host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Fields of the message currently open in the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostMessage {
    pub subject: String,
    /// Sender email address.
    pub sender: String,
    /// Body as plain text.
    pub body: String,
    /// Durable item id. Drafts that were never saved have none.
    pub item_id: Option<String>,
}

/// Fields of the draft currently being composed in the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostDraft {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
}

/// Callback invoked when the user switches to another item.
///
/// Carries no payload; receivers re-read what they need.
pub type ItemChangedHandler = Box<dyn Fn() + Send + Sync>;

/// Narrow contract the add-in needs from the host mail client.
///
/// Implemented by the embedding host binding and by [`OfflineMailHost`]
/// for degraded mode and local development.
///
/// [`OfflineMailHost`]: super::OfflineMailHost
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailHostPort: Send + Sync {
    /// Resolves once the host is ready to serve item requests.
    async fn ready(&self) -> HostResult<()>;

    /// True when the active item is an unsaved draft.
    fn is_compose_item(&self) -> bool;

    /// Reads the message open in read mode.
    async fn read_message(&self) -> HostResult<HostMessage>;

    /// Reads the draft open in compose mode.
    async fn read_draft(&self) -> HostResult<HostDraft>;

    /// Replaces the draft body with HTML.
    async fn set_draft_body_html(&self, html: &str) -> HostResult<()>;

    /// Opens a reply form pre-filled with HTML.
    async fn display_reply_form(&self, html: &str) -> HostResult<()>;

    /// Replaces the draft's To recipients.
    async fn set_draft_recipients(&self, to: &[String]) -> HostResult<()>;

    async fn set_draft_subject(&self, subject: &str) -> HostResult<()>;

    /// Registers a handler for item switches.
    fn subscribe_item_changed(&self, handler: ItemChangedHandler) -> HostResult<()>;
}
