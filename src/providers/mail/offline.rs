//! In-memory mail host used when no live host is available.
//!
//! Reads return a sample message, writes only log. Item switches can be
//! simulated with [`OfflineMailHost::switch_item`].

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::traits::{HostDraft, HostMessage, HostResult, ItemChangedHandler, MailHostPort};

const SAMPLE_SUBJECT: &str = "Projektbesprechung für nächste Woche";
const SAMPLE_SENDER: &str = "maria.mueller@example.com";
const SAMPLE_BODY: &str = "Hallo James,\n\n\
Ich hoffe, es geht dir gut. Ich wollte mich bezüglich der Projektbesprechung für nächste Woche \
bei dir melden. Könnten wir einen Termin für Dienstag oder Mittwoch vereinbaren?\n\n\
Es wäre wichtig, dass wir die aktuellen Fortschritte besprechen und die nächsten Schritte planen. \
Bitte lass mich wissen, welcher Tag dir besser passt.\n\n\
Vielen Dank und beste Grüße,\nMaria";

/// A write the offline host received and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardedWrite {
    DraftBody(String),
    ReplyForm(String),
    Recipients(Vec<String>),
    Subject(String),
}

/// Offline stand-in for the host mail client.
pub struct OfflineMailHost {
    compose_mode: bool,
    message: Mutex<HostMessage>,
    draft: Mutex<HostDraft>,
    discarded: Mutex<Vec<DiscardedWrite>>,
    handlers: Mutex<Vec<ItemChangedHandler>>,
}

impl OfflineMailHost {
    /// Creates an offline host serving the sample message.
    pub fn new(compose_mode: bool) -> Self {
        Self {
            compose_mode,
            message: Mutex::new(Self::sample_message()),
            draft: Mutex::new(HostDraft::default()),
            discarded: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// The message served until another item is switched in.
    pub fn sample_message() -> HostMessage {
        HostMessage {
            subject: SAMPLE_SUBJECT.to_string(),
            sender: SAMPLE_SENDER.to_string(),
            body: SAMPLE_BODY.to_string(),
            item_id: Some("offline-item".to_string()),
        }
    }

    /// Replaces the open message and notifies item-changed subscribers.
    pub fn switch_item(&self, message: HostMessage) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = message;
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler();
        }
    }

    /// Writes received so far, oldest first.
    pub fn discarded_writes(&self) -> Vec<DiscardedWrite> {
        self.discarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn discard(&self, write: DiscardedWrite) {
        tracing::info!(?write, "Offline mail host: write not applied");
        self.discarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(write);
    }
}

impl Default for OfflineMailHost {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl MailHostPort for OfflineMailHost {
    async fn ready(&self) -> HostResult<()> {
        Ok(())
    }

    fn is_compose_item(&self) -> bool {
        self.compose_mode
    }

    async fn read_message(&self) -> HostResult<HostMessage> {
        Ok(self
            .message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn read_draft(&self) -> HostResult<HostDraft> {
        Ok(self
            .draft
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn set_draft_body_html(&self, html: &str) -> HostResult<()> {
        self.discard(DiscardedWrite::DraftBody(html.to_string()));
        Ok(())
    }

    async fn display_reply_form(&self, html: &str) -> HostResult<()> {
        self.discard(DiscardedWrite::ReplyForm(html.to_string()));
        Ok(())
    }

    async fn set_draft_recipients(&self, to: &[String]) -> HostResult<()> {
        self.draft
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to = to.to_vec();
        self.discard(DiscardedWrite::Recipients(to.to_vec()));
        Ok(())
    }

    async fn set_draft_subject(&self, subject: &str) -> HostResult<()> {
        self.draft
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subject = subject.to_string();
        self.discard(DiscardedWrite::Subject(subject.to_string()));
        Ok(())
    }

    fn subscribe_item_changed(&self, handler: ItemChangedHandler) -> HostResult<()> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
        Ok(())
    }
}
