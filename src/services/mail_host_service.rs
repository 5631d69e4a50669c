//! Mail host adapter.
//!
//! The [`MailHostService`] owns the email and draft snapshots, keeps them in
//! sync with the host and writes generated text back into the host. When the
//! host never becomes ready it falls back to an [`OfflineMailHost`] so the
//! rest of the add-in keeps working.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::Notify;

use crate::config::HostSettings;
use crate::domain::{ComposeSnapshot, EmailSnapshot, SnapshotCell};
use crate::providers::mail::{HostError, HostResult, MailHostPort, OfflineMailHost};

/// Purpose shown for a fresh draft until the user provides one.
pub const DEFAULT_COMPOSE_PURPOSE: &str = "Neue E-Mail verfassen";

/// Connection state of the mail host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostStatus {
    #[default]
    Uninitialized,
    Connected,
    /// Running against the offline stand-in.
    Degraded,
}

/// Reads from and writes to the host mail client.
pub struct MailHostService {
    port: RwLock<Arc<dyn MailHostPort>>,
    status: Mutex<HostStatus>,
    ready_timeout: Duration,
    offline_compose_mode: bool,
    email: SnapshotCell<EmailSnapshot>,
    compose: SnapshotCell<ComposeSnapshot>,
    item_changed: Arc<Notify>,
}

impl MailHostService {
    /// Wraps a live host binding. Call [`initialize`](Self::initialize) before use.
    pub fn new(port: Arc<dyn MailHostPort>, settings: &HostSettings) -> Self {
        Self {
            port: RwLock::new(port),
            status: Mutex::new(HostStatus::Uninitialized),
            ready_timeout: Duration::from_secs(settings.ready_timeout_secs),
            offline_compose_mode: settings.offline_compose_mode,
            email: SnapshotCell::default(),
            compose: SnapshotCell::default(),
            item_changed: Arc::new(Notify::new()),
        }
    }

    /// Creates a service with no host binding at all; it starts degraded.
    pub fn detached(settings: &HostSettings) -> Self {
        let offline = Arc::new(OfflineMailHost::new(settings.offline_compose_mode));
        let service = Self::new(offline, settings);
        *service.status.lock().unwrap_or_else(PoisonError::into_inner) = HostStatus::Degraded;
        service
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    fn port(&self) -> Arc<dyn MailHostPort> {
        Arc::clone(&self.port.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn status(&self) -> HostStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: HostStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Waits for the host, subscribes to item switches and loads the first
    /// snapshots. Never fails: any host problem switches to degraded mode.
    pub async fn initialize(&self) -> HostStatus {
        if self.status() != HostStatus::Degraded {
            let port = self.port();
            let ready = match tokio::time::timeout(self.ready_timeout, port.ready()).await {
                Ok(result) => result,
                Err(_) => Err(HostError::Timeout(self.ready_timeout)),
            };
            match ready {
                Ok(()) => {
                    tracing::info!(compose_mode = port.is_compose_item(), "Mail host ready");
                    self.set_status(HostStatus::Connected);
                }
                Err(e) => self.degrade(&e),
            }
        }

        let email = self.email.clone();
        let compose = self.compose.clone();
        let notify = Arc::clone(&self.item_changed);
        let subscribed = self.port().subscribe_item_changed(Box::new(move || {
            email.invalidate();
            compose.invalidate();
            notify.notify_one();
        }));
        if let Err(e) = subscribed {
            tracing::warn!(error = %e, "Could not subscribe to item changes");
        }

        if let Err(e) = self.refresh_snapshots().await {
            tracing::warn!(error = %e, "Initial snapshot refresh failed");
        }
        self.status()
    }

    fn degrade(&self, reason: &HostError) {
        tracing::warn!(error = %reason, "Mail host unavailable, continuing offline");
        *self.port.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(OfflineMailHost::new(self.offline_compose_mode));
        self.set_status(HostStatus::Degraded);
    }

    pub fn is_compose_mode(&self) -> bool {
        self.port().is_compose_item()
    }

    /// Snapshot cell of the message open in read mode.
    pub fn email_cell(&self) -> &SnapshotCell<EmailSnapshot> {
        &self.email
    }

    /// Snapshot cell of the draft open in compose mode.
    pub fn compose_cell(&self) -> &SnapshotCell<ComposeSnapshot> {
        &self.compose
    }

    /// Reads the current message straight from the host.
    pub async fn current_email(&self) -> HostResult<EmailSnapshot> {
        let message = self.port().read_message().await?;
        Ok(EmailSnapshot {
            subject: message.subject,
            sender: message.sender,
            content: message.body,
            summary: String::new(),
            item_id: message.item_id,
        })
    }

    /// Reads the current draft straight from the host.
    pub async fn compose_context(&self) -> HostResult<ComposeSnapshot> {
        let draft = self.port().read_draft().await?;
        Ok(ComposeSnapshot {
            to: draft.to,
            cc: draft.cc,
            subject: draft.subject,
            purpose: DEFAULT_COMPOSE_PURPOSE.to_string(),
        })
    }

    /// Re-reads the active item into its snapshot cell.
    pub async fn refresh_snapshots(&self) -> HostResult<()> {
        if self.is_compose_mode() {
            let draft = self.compose_context().await?;
            let generation = self.compose.replace(draft);
            tracing::debug!(?generation, "Draft snapshot refreshed");
        } else {
            let email = self.current_email().await?;
            let generation = self.email.replace(email);
            tracing::debug!(?generation, "Email snapshot refreshed");
        }
        Ok(())
    }

    /// Resolves on the next item switch reported by the host.
    pub async fn next_item_change(&self) {
        self.item_changed.notified().await;
    }

    /// Registers an additional callback for item switches.
    pub fn on_item_changed(&self, callback: impl Fn() + Send + Sync + 'static) -> HostResult<()> {
        self.port().subscribe_item_changed(Box::new(callback))
    }

    /// Replaces the draft body with `text`.
    pub async fn insert_compose_text(&self, text: &str) -> HostResult<()> {
        let port = self.port();
        if !port.is_compose_item() {
            return Err(HostError::NotComposing);
        }
        port.set_draft_body_html(&text_to_html(text)).await?;
        tracing::info!(chars = text.chars().count(), "Inserted text into draft");
        Ok(())
    }

    /// Writes recipients and subject into the draft and mirrors them into
    /// the draft snapshot.
    pub async fn set_draft_header(&self, to: &[String], subject: &str) -> HostResult<()> {
        let port = self.port();
        if !port.is_compose_item() {
            return Err(HostError::NotComposing);
        }
        port.set_draft_recipients(to).await?;
        port.set_draft_subject(subject).await?;

        let generation = self.compose.generation();
        self.compose.update_if_current(generation, |draft| {
            draft.to = to.to_vec();
            draft.subject = subject.to_string();
        });
        tracing::info!(recipients = to.len(), "Updated draft header");
        Ok(())
    }

    /// Opens a reply form pre-filled with `text`.
    pub async fn insert_reply_text(&self, text: &str) -> HostResult<()> {
        let port = self.port();
        if port.is_compose_item() {
            return Err(HostError::NotReading);
        }
        port.display_reply_form(&text_to_html(text)).await?;
        tracing::info!(chars = text.chars().count(), "Opened reply form");
        Ok(())
    }
}

/// Renders plain text as an HTML fragment for the host editor.
pub fn text_to_html(text: &str) -> String {
    let mut html = String::with_capacity(text.len() + 16);
    html.push_str("<div>");
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            html.push_str("<br>");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        for c in line.chars() {
            match c {
                '&' => html.push_str("&amp;"),
                '<' => html.push_str("&lt;"),
                '>' => html.push_str("&gt;"),
                '"' => html.push_str("&quot;"),
                '\'' => html.push_str("&#39;"),
                _ => html.push(c),
            }
        }
    }
    html.push_str("</div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Generation;
    use crate::providers::mail::{
        DiscardedWrite, HostDraft, HostMessage, ItemChangedHandler, MockMailHostPort,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn settings() -> HostSettings {
        HostSettings::default()
    }

    struct HangingHost;

    #[async_trait]
    impl MailHostPort for HangingHost {
        async fn ready(&self) -> HostResult<()> {
            std::future::pending().await
        }

        fn is_compose_item(&self) -> bool {
            false
        }

        async fn read_message(&self) -> HostResult<HostMessage> {
            Err(HostError::Unavailable("hanging".to_string()))
        }

        async fn read_draft(&self) -> HostResult<HostDraft> {
            Err(HostError::Unavailable("hanging".to_string()))
        }

        async fn set_draft_body_html(&self, _html: &str) -> HostResult<()> {
            Ok(())
        }

        async fn display_reply_form(&self, _html: &str) -> HostResult<()> {
            Ok(())
        }

        async fn set_draft_recipients(&self, _to: &[String]) -> HostResult<()> {
            Ok(())
        }

        async fn set_draft_subject(&self, _subject: &str) -> HostResult<()> {
            Ok(())
        }

        fn subscribe_item_changed(&self, _handler: ItemChangedHandler) -> HostResult<()> {
            Ok(())
        }
    }

    fn reading_mock() -> MockMailHostPort {
        let mut port = MockMailHostPort::new();
        port.expect_ready().returning(|| Ok(()));
        port.expect_is_compose_item().return_const(false);
        port.expect_subscribe_item_changed().returning(|_| Ok(()));
        port.expect_read_message().returning(|| {
            Ok(HostMessage {
                subject: "Offerte".to_string(),
                sender: "einkauf@example.ch".to_string(),
                body: "Guten Tag, anbei die Offerte.".to_string(),
                item_id: Some("AAMk1".to_string()),
            })
        });
        port
    }

    #[test]
    fn html_conversion_escapes_and_breaks_lines() {
        assert_eq!(
            text_to_html("Hallo <Team> & \"alle\",\r\nbis morgen\n"),
            "<div>Hallo &lt;Team&gt; &amp; &quot;alle&quot;,<br>bis morgen<br></div>"
        );
        assert_eq!(text_to_html(""), "<div></div>");
    }

    #[tokio::test]
    async fn initialize_reads_email_snapshot() {
        let service = MailHostService::new(Arc::new(reading_mock()), &settings());

        assert_eq!(service.initialize().await, HostStatus::Connected);

        let email = service.email_cell().get();
        assert_eq!(email.subject, "Offerte");
        assert_eq!(email.sender, "einkauf@example.ch");
        assert_eq!(email.item_id.as_deref(), Some("AAMk1"));
        assert_eq!(service.email_cell().generation(), Generation(1));
    }

    #[tokio::test]
    async fn not_ready_host_degrades_to_offline() {
        let mut port = MockMailHostPort::new();
        port.expect_ready()
            .returning(|| Err(HostError::Unavailable("not outlook".to_string())));

        let service = MailHostService::new(Arc::new(port), &settings());
        assert_eq!(service.initialize().await, HostStatus::Degraded);
        assert_eq!(
            service.email_cell().get().sender,
            OfflineMailHost::sample_message().sender
        );
    }

    #[tokio::test]
    async fn ready_timeout_degrades_to_offline() {
        let service = MailHostService::new(Arc::new(HangingHost), &settings())
            .with_ready_timeout(Duration::from_millis(20));

        assert_eq!(service.initialize().await, HostStatus::Degraded);
        assert!(!service.is_compose_mode());
        assert!(service.email_cell().get().content.contains("Dienstag oder Mittwoch"));
    }

    #[tokio::test]
    async fn detached_service_uses_configured_compose_mode() {
        let host = HostSettings {
            offline_compose_mode: true,
            ..settings()
        };
        let service = MailHostService::detached(&host);

        assert_eq!(service.initialize().await, HostStatus::Degraded);
        assert!(service.is_compose_mode());
        assert_eq!(service.compose_cell().get().purpose, DEFAULT_COMPOSE_PURPOSE);
    }

    #[tokio::test]
    async fn compose_insert_writes_html_body() {
        let mut port = MockMailHostPort::new();
        port.expect_is_compose_item().return_const(true);
        port.expect_set_draft_body_html()
            .withf(|html| html == "<div>Liebe Anna,<br>a &lt; b</div>")
            .times(1)
            .returning(|_| Ok(()));

        let service = MailHostService::new(Arc::new(port), &settings());
        service
            .insert_compose_text("Liebe Anna,\na < b")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn draft_header_writes_host_and_snapshot() {
        let mut port = MockMailHostPort::new();
        port.expect_is_compose_item().return_const(true);
        port.expect_set_draft_recipients()
            .withf(|to| to.len() == 1 && to[0] == "anna@example.ch")
            .times(1)
            .returning(|_| Ok(()));
        port.expect_set_draft_subject()
            .withf(|subject| subject == "Offerte Q3")
            .times(1)
            .returning(|_| Ok(()));

        let service = MailHostService::new(Arc::new(port), &settings());
        let before = service.compose_cell().generation();
        service
            .set_draft_header(&["anna@example.ch".to_string()], "Offerte Q3")
            .await
            .unwrap();

        let draft = service.compose_cell().get();
        assert_eq!(draft.to, vec!["anna@example.ch".to_string()]);
        assert_eq!(draft.subject, "Offerte Q3");
        assert_eq!(service.compose_cell().generation(), before);
    }

    #[tokio::test]
    async fn draft_header_requires_draft() {
        let service = MailHostService::new(Arc::new(reading_mock()), &settings());
        let err = service.set_draft_header(&[], "x").await.unwrap_err();
        assert!(matches!(err, HostError::NotComposing));
    }

    #[tokio::test]
    async fn compose_insert_requires_draft() {
        let service = MailHostService::new(Arc::new(reading_mock()), &settings());
        let err = service.insert_compose_text("x").await.unwrap_err();
        assert!(matches!(err, HostError::NotComposing));
    }

    #[tokio::test]
    async fn reply_insert_opens_reply_form() {
        let mut port = reading_mock();
        port.expect_display_reply_form()
            .withf(|html| html == "<div>Hallo Maria,<br>gerne.</div>")
            .times(1)
            .returning(|_| Ok(()));

        let service = MailHostService::new(Arc::new(port), &settings());
        service.insert_reply_text("Hallo Maria,\ngerne.").await.unwrap();
    }

    #[tokio::test]
    async fn reply_insert_rejected_in_compose_mode() {
        let mut port = MockMailHostPort::new();
        port.expect_is_compose_item().return_const(true);

        let service = MailHostService::new(Arc::new(port), &settings());
        let err = service.insert_reply_text("x").await.unwrap_err();
        assert!(matches!(err, HostError::NotReading));
    }

    #[tokio::test]
    async fn item_change_invalidates_and_refresh_rereads() {
        let host = Arc::new(OfflineMailHost::default());
        let service = MailHostService::new(host.clone(), &settings());
        service.initialize().await;
        let before = service.email_cell().generation();

        host.switch_item(HostMessage {
            subject: "Rechnung März".to_string(),
            sender: "buchhaltung@example.ch".to_string(),
            body: "Bitte die Rechnung bis Ende Monat begleichen.".to_string(),
            item_id: Some("item-2".to_string()),
        });
        assert!(service.email_cell().generation() > before);

        service.next_item_change().await;
        service.refresh_snapshots().await.unwrap();
        assert_eq!(service.email_cell().get().subject, "Rechnung März");
    }

    #[tokio::test]
    async fn offline_writes_are_discarded() {
        let host = Arc::new(OfflineMailHost::new(true));
        let service = MailHostService::new(host.clone(), &settings());
        service.initialize().await;

        service.insert_compose_text("Hallo").await.unwrap();
        assert_eq!(
            host.discarded_writes(),
            vec![DiscardedWrite::DraftBody("<div>Hallo</div>".to_string())]
        );
    }
}
