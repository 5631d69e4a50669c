//! Processing orchestrator.
//!
//! Takes a user action plus the current snapshots, validates the content,
//! builds the prompt, calls the completion client and publishes the result
//! as the output shown in the chat panel.
//!
//! Only one action runs at a time; a call made while another is in flight is
//! rejected with [`ProcessingError::Busy`]. Summary generation has its own
//! independent flag so it never clobbers the chat output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use regex::RegexSet;
use thiserror::Error;

use super::completion_service::CompletionClient;
use super::prompt_builder::build_prompt;
use crate::config::GenerationSettings;
use crate::domain::{
    Action, ComposeSnapshot, EmailSnapshot, Generation, RequestContent, RequestDescriptor,
    SnapshotCell,
};
use crate::providers::ai::LlmError;
use crate::providers::mail::HostError;

/// Prefix marking error text in the output panel.
pub const ERROR_MARKER: &str = "❌";

/// Minimum number of characters (after trimming) accepted as email content.
pub const MIN_CONTENT_CHARS: usize = 10;

/// Why email content was rejected before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContentIssue {
    #[error("content is empty or shorter than {MIN_CONTENT_CHARS} characters")]
    TooShort,

    #[error("content contains undisplayable parts")]
    Unrenderable,
}

/// Failures surfaced to the user. All are terminal for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("completion endpoint is not configured")]
    Configuration,

    #[error("content rejected: {0}")]
    ContentInvalid(ContentIssue),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("mail host unavailable: {0}")]
    HostUnavailable(String),

    #[error("clipboard copy failed: {0}")]
    Clipboard(String),

    #[error("unexpected error: {0}")]
    Unknown(String),

    #[error("another request is still running")]
    Busy,

    #[error("the item changed while the request was running")]
    ItemChanged,
}

impl ProcessingError {
    /// Short message for the output panel, prefixed with [`ERROR_MARKER`].
    pub fn user_message(&self) -> String {
        let text = match self {
            ProcessingError::Configuration => {
                "API Key nicht konfiguriert. Bitte fügen Sie Ihren API Key hinzu.".to_string()
            }
            ProcessingError::ContentInvalid(ContentIssue::TooShort) => {
                "E-Mail-Inhalt zu kurz oder nicht lesbar".to_string()
            }
            ProcessingError::ContentInvalid(ContentIssue::Unrenderable) => {
                "E-Mail enthält nicht darstellbare Inhalte".to_string()
            }
            ProcessingError::Upstream(message) => format!("Fehler: {message}"),
            ProcessingError::Timeout(secs) => format!(
                "Zeitüberschreitung nach {secs} Sekunden. Bitte versuchen Sie es erneut."
            ),
            ProcessingError::HostUnavailable(message) => {
                format!("Verbindung zu Outlook nicht möglich: {message}")
            }
            ProcessingError::Clipboard(_) => {
                "Kopieren fehlgeschlagen – bitte manuell markieren".to_string()
            }
            ProcessingError::Unknown(_) => {
                "Fehler bei der Verarbeitung. Bitte versuchen Sie es erneut.".to_string()
            }
            ProcessingError::Busy => {
                "Eine Anfrage läuft bereits. Bitte warten Sie, bis sie abgeschlossen ist."
                    .to_string()
            }
            ProcessingError::ItemChanged => {
                "Die E-Mail wurde gewechselt. Bitte führen Sie die Aktion erneut aus.".to_string()
            }
        };
        format!("{ERROR_MARKER} {text}")
    }
}

impl From<LlmError> for ProcessingError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::NotConfigured(_) => ProcessingError::Configuration,
            LlmError::Timeout(after) => ProcessingError::Timeout(after.as_secs()),
            LlmError::ApiError { .. } | LlmError::InvalidResponse(_) | LlmError::HttpError(_) => {
                ProcessingError::Upstream(error.to_string())
            }
        }
    }
}

impl From<HostError> for ProcessingError {
    fn from(error: HostError) -> Self {
        match error {
            HostError::Unavailable(_) | HostError::Timeout(_) => {
                ProcessingError::HostUnavailable(error.to_string())
            }
            other => ProcessingError::Unknown(other.to_string()),
        }
    }
}

/// Where the current (or last) action is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    Requesting,
    Succeeded,
    Failed,
    /// Stopped before the network call (configuration or content).
    Rejected,
    /// The response arrived after the item was switched and was dropped.
    Discarded,
}

/// What the output panel currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Output {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// An action is running.
    Pending,
    Text(String),
    Error(ProcessingError),
}

impl Output {
    /// Text for the output panel.
    pub fn display_text(&self) -> String {
        match self {
            Output::Idle => "Warte auf Ausgabe...".to_string(),
            Output::Pending => "Verarbeitung läuft...".to_string(),
            Output::Text(text) => text.clone(),
            Output::Error(error) => error.user_message(),
        }
    }

    /// Generated text, if the last action succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            Output::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Everything one `run_action` call needs.
#[derive(Debug, Clone)]
pub struct ActionInput {
    pub action: Action,
    pub instruction: Option<String>,
    pub recipient_name: Option<String>,
    pub settings: GenerationSettings,
    pub compose_mode: bool,
    pub email: EmailSnapshot,
    pub compose: ComposeSnapshot,
    /// Cell the active snapshot was read from.
    pub source: ActionSource,
    /// Generation of `source` when the snapshots were taken.
    pub generation: Generation,
}

/// The snapshot cell an action reads from.
#[derive(Debug, Clone)]
pub enum ActionSource {
    Email(SnapshotCell<EmailSnapshot>),
    Compose(SnapshotCell<ComposeSnapshot>),
}

impl ActionSource {
    pub fn generation(&self) -> Generation {
        match self {
            ActionSource::Email(cell) => cell.generation(),
            ActionSource::Compose(cell) => cell.generation(),
        }
    }
}

/// Result of a summary request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// The summary was stored on the snapshot.
    Applied(String),
    /// The snapshot was refreshed while the request ran; the summary was dropped.
    Stale,
}

#[derive(Debug, Default)]
struct ProcessingState {
    loading: bool,
    phase: Phase,
    last_output: Output,
}

/// Resets the loading flag on every exit path, including cancellation.
struct FlightGuard<'a> {
    state: &'a Mutex<ProcessingState>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.loading = false;
        if matches!(state.phase, Phase::Validating | Phase::Requesting) {
            tracing::warn!("Action abandoned before it settled");
            state.phase = Phase::Failed;
            state.last_output = Output::Error(ProcessingError::Unknown(
                "request abandoned".to_string(),
            ));
        }
    }
}

struct SummaryGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SummaryGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ProcessingError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProcessingError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for SummaryGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Orchestrates validation, prompt building and completion calls.
pub struct ProcessingService {
    client: Arc<CompletionClient>,
    state: Mutex<ProcessingState>,
    summary_loading: AtomicBool,
}

impl ProcessingService {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self {
            client,
            state: Mutex::new(ProcessingState::default()),
            summary_loading: AtomicBool::new(false),
        }
    }

    /// The completion client used by this service.
    pub fn client(&self) -> &Arc<CompletionClient> {
        &self.client
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn is_summary_loading(&self) -> bool {
        self.summary_loading.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn last_output(&self) -> Output {
        self.lock().last_output.clone()
    }

    /// Resets the output panel. Ignored while an action is running.
    pub fn clear_output(&self) {
        let mut state = self.lock();
        if !state.loading {
            state.last_output = Output::Idle;
            state.phase = Phase::Idle;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProcessingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<FlightGuard<'_>, ProcessingError> {
        let mut state = self.lock();
        if state.loading {
            return Err(ProcessingError::Busy);
        }
        state.loading = true;
        state.phase = Phase::Validating;
        state.last_output = Output::Pending;
        Ok(FlightGuard { state: &self.state })
    }

    fn set_phase(&self, phase: Phase) {
        self.lock().phase = phase;
    }

    fn settle(
        &self,
        phase: Phase,
        result: Result<String, ProcessingError>,
    ) -> Result<String, ProcessingError> {
        let mut state = self.lock();
        state.phase = phase;
        state.last_output = match &result {
            Ok(text) => Output::Text(text.clone()),
            Err(error) => Output::Error(error.clone()),
        };
        result
    }

    /// Runs one user action and publishes its outcome as the last output.
    pub async fn run_action(&self, input: ActionInput) -> Result<String, ProcessingError> {
        let _flight = match self.begin() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::info!(action = %input.action, "Action rejected, another one is running");
                return Err(e);
            }
        };
        tracing::info!(action = %input.action, compose_mode = input.compose_mode, "Running action");

        if !self.client.is_configured() {
            tracing::warn!("Completion endpoint not configured");
            return self.settle(Phase::Rejected, Err(ProcessingError::Configuration));
        }

        if !input.compose_mode {
            if let Err(issue) = validate_content(&input.email.content) {
                tracing::info!(action = %input.action, %issue, "Email content rejected");
                return self.settle(Phase::Rejected, Err(ProcessingError::ContentInvalid(issue)));
            }
        }

        let descriptor = RequestDescriptor::for_mode(
            input.action,
            input.settings,
            input.instruction.as_deref(),
            input.recipient_name.as_deref(),
            input.compose_mode,
            &input.email,
            &input.compose,
        );
        let prompt = build_prompt(&descriptor);

        self.set_phase(Phase::Requesting);
        let result = self.client.complete(&prompt).await;

        if input.source.generation() != input.generation {
            tracing::info!(
                action = %input.action,
                generation = ?input.generation,
                "Discarding output for a replaced item"
            );
            return self.settle(Phase::Discarded, Err(ProcessingError::ItemChanged));
        }
        match result {
            Ok(text) => self.settle(Phase::Succeeded, Ok(text)),
            Err(e) => self.settle(Phase::Failed, Err(e.into())),
        }
    }

    /// Summarizes the email in `cell` and stores the summary on it.
    ///
    /// Recomputing overwrites an earlier summary. If the snapshot is refreshed
    /// while the request runs, the result is discarded.
    pub async fn generate_summary(
        &self,
        cell: &SnapshotCell<EmailSnapshot>,
        settings: &GenerationSettings,
    ) -> Result<SummaryOutcome, ProcessingError> {
        let _guard = SummaryGuard::acquire(&self.summary_loading)?;

        if !self.client.is_configured() {
            return Err(ProcessingError::Configuration);
        }

        let (generation, email) = cell.snapshot();
        validate_content(&email.content).map_err(ProcessingError::ContentInvalid)?;

        let descriptor = RequestDescriptor {
            action: Action::Summarize,
            settings: settings.clone(),
            instruction: None,
            recipient_name: None,
            content: RequestContent::Email(email.content),
        };
        let summary = self.client.complete(&build_prompt(&descriptor)).await?;

        let stored = summary.clone();
        if cell.update_if_current(generation, move |email| email.summary = stored) {
            Ok(SummaryOutcome::Applied(summary))
        } else {
            tracing::info!(?generation, "Discarding summary for a replaced item");
            Ok(SummaryOutcome::Stale)
        }
    }
}

fn unrenderable_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)\[image:.*\]",
            r"(?i)\[cid:.*\]",
            r"(?i)undisplayable content",
        ])
        .expect("static patterns compile")
    })
}

/// Pre-flight check on email content before it is sent anywhere.
pub fn validate_content(content: &str) -> Result<(), ContentIssue> {
    if content.trim().chars().count() < MIN_CONTENT_CHARS {
        return Err(ContentIssue::TooShort);
    }
    if unrenderable_patterns().is_match(content) {
        return Err(ContentIssue::Unrenderable);
    }
    Ok(())
}
