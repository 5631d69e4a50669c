//! Copy generated text to the clipboard.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

/// Clipboard errors.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("clipboard rejected the write: {0}")]
    Rejected(String),

    #[error("all clipboard sinks failed")]
    Exhausted,
}

/// Somewhere text can be copied to.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    fn name(&self) -> &str;

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// In-process clipboard for offline sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last text written, if any.
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ClipboardSink for MemoryClipboard {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());
        Ok(())
    }
}

/// Tries the primary sink first, then the fallback.
pub struct ClipboardService {
    primary: Arc<dyn ClipboardSink>,
    fallback: Option<Arc<dyn ClipboardSink>>,
}

impl ClipboardService {
    pub fn new(primary: Arc<dyn ClipboardSink>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ClipboardSink>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Copies `text`, returning the name of the sink that accepted it.
    pub async fn copy(&self, text: &str) -> Result<String, ClipboardError> {
        match self.primary.write_text(text).await {
            Ok(()) => return Ok(self.primary.name().to_string()),
            Err(e) => {
                tracing::warn!(sink = self.primary.name(), error = %e, "Clipboard write failed")
            }
        }

        let Some(fallback) = &self.fallback else {
            return Err(ClipboardError::Exhausted);
        };
        match fallback.write_text(text).await {
            Ok(()) => {
                tracing::debug!(sink = fallback.name(), "Copied via fallback clipboard");
                Ok(fallback.name().to_string())
            }
            Err(e) => {
                tracing::warn!(sink = fallback.name(), error = %e, "Fallback clipboard failed");
                Err(ClipboardError::Exhausted)
            }
        }
    }
}
