//! Event bus for cross-component communication.
//!
//! The UI subscribes here to learn about mode switches, finished actions and
//! status popups without polling the services.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::Action;

/// Events published by the [`App`](super::App).
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The host switched to another item.
    ItemChanged,
    /// Compose mode was entered or left.
    ModeChanged { compose_mode: bool },
    /// The selected action changed.
    ActionSelected(Action),
    /// An action settled; `success` is false when the output is an error.
    ProcessingFinished { action: Action, success: bool },
    /// A summary was stored on the email snapshot.
    SummaryUpdated,
    /// Generation settings changed.
    SettingsUpdated,
    /// Show a status popup.
    ShowNotification(Notification),
}

/// A status popup.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: Option<String>,
    pub level: NotificationLevel,
    /// Auto-dismiss after duration (milliseconds).
    pub auto_dismiss_ms: Option<u64>,
}

/// Notification severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationLevel {
    #[default]
    Info,
    Success,
    Error,
}

impl Notification {
    pub fn info(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            level: NotificationLevel::Info,
            auto_dismiss_ms: Some(5000),
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            level: NotificationLevel::Success,
            auto_dismiss_ms: Some(3000),
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            level: NotificationLevel::Error,
            auto_dismiss_ms: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Subscriber ID for unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Event handler function type.
pub type EventHandler = Box<dyn Fn(&AppEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: HashMap<u64, EventHandler>,
}

/// Publish-subscribe bus. Clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to all events.
    pub fn subscribe<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.insert(id, Box::new(handler));
        SubscriberId(id)
    }

    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .remove(&subscriber_id.0);
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AppEvent) {
        tracing::trace!(?event, "Publishing event");
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        for handler in inner.handlers.values() {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
