//! Application facade and lifecycle.
//!
//! [`App`] wires the services together and exposes the operations the
//! task-pane UI calls: running actions, switching actions and settings,
//! copying or inserting the output and first-run handling.

mod events;
mod state;

pub use events::{AppEvent, EventBus, EventHandler, Notification, NotificationLevel, SubscriberId};
pub use state::AppState;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::Context;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{CompletionSettings, ConfigError, GenerationSettings, Settings};
use crate::domain::Action;
use crate::providers::ai::OpenAiCompatibleProvider;
use crate::services::{
    ActionInput, ActionSource, ClipboardService, CompletionClient, MailHostService, Output,
    ProcessingError, ProcessingService, SummaryOutcome,
};
use crate::storage::{
    FlagStore, FlagStoreError, KeychainAccess, KeychainError, SecretStore, TUTORIAL_COMPLETED,
};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "MAILAIDER_API_KEY";

/// Data-protection notice shown from the header.
pub const PRIVACY_NOTICE: &str = "**DSGVO-sichere KI-Verarbeitung**\n\n\
• Verschlüsselte Übertragung\n\
• Keine Datenspeicherung nach Verarbeitung\n\
• Konform mit Schweizer Datenschutzgesetzen\n\
• Keine Verwendung für Training";

const COPY_OK: &str = "Text wurde in die Zwischenablage kopiert";
const NOTHING_TO_USE: &str = "❌ Keine Ausgabe vorhanden";
const INSERTED_DRAFT: &str = "Text wurde in die E-Mail eingefügt";
const INSERTED_REPLY: &str = "Antwort wurde in das Antwortformular eingefügt";
const INSERT_FAILED: &str = "❌ Fehler beim Einfügen des Textes";
const API_KEY_SAVED: &str = "API Key erfolgreich konfiguriert!";

/// Errors from facade operations that touch local persistence.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Keychain(#[from] KeychainError),

    #[error(transparent)]
    Flags(#[from] FlagStoreError),

    #[error("API key must not be empty")]
    EmptyApiKey,
}

/// Collaborators the facade is built from.
pub struct AppDeps {
    pub host: Arc<MailHostService>,
    pub secrets: Arc<dyn SecretStore>,
    pub flags: FlagStore,
    pub clipboard: ClipboardService,
    /// Where settings changes are persisted. `None` keeps them in memory.
    pub settings_path: Option<PathBuf>,
}

/// The add-in core.
pub struct App {
    settings: Mutex<Settings>,
    settings_path: Option<PathBuf>,
    state: Mutex<AppState>,
    host: Arc<MailHostService>,
    processing: ProcessingService,
    clipboard: ClipboardService,
    secrets: Arc<dyn SecretStore>,
    flags: FlagStore,
    events: EventBus,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl App {
    /// Initializes the host, resolves credentials and starts watching for
    /// item switches.
    pub async fn start(settings: Settings, deps: AppDeps) -> anyhow::Result<Arc<Self>> {
        settings.validate().context("invalid settings")?;

        let env_key = std::env::var(API_KEY_ENV).ok();
        let api_key = resolve_api_key(env_key, deps.secrets.as_ref(), &settings.completion).await;
        let client = Arc::new(CompletionClient::from_settings(&settings.completion, api_key));

        let host_status = deps.host.initialize().await;

        let mut state = AppState::new(settings.generation.clone());
        state.set_compose_mode(deps.host.is_compose_mode());
        state.host_status = host_status;
        state.show_tutorial = !deps.flags.is_set(TUTORIAL_COMPLETED);
        state.show_api_key_input = !client.is_configured();

        tracing::info!(
            ?host_status,
            compose_mode = state.effective_compose_mode(),
            configured = client.is_configured(),
            "Add-in started"
        );

        let app = Arc::new(Self {
            settings: Mutex::new(settings),
            settings_path: deps.settings_path,
            state: Mutex::new(state),
            host: deps.host,
            processing: ProcessingService::new(client),
            clipboard: deps.clipboard,
            secrets: deps.secrets,
            flags: deps.flags,
            events: EventBus::new(),
            watcher: Mutex::new(None),
        });

        let watcher = tokio::spawn(watch_items(Arc::clone(&app.host), Arc::downgrade(&app)));
        *app.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(watcher);

        Ok(app)
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> AppState {
        self.lock_state().clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn host(&self) -> &MailHostService {
        &self.host
    }

    /// What the output panel currently shows.
    pub fn output(&self) -> Output {
        self.processing.last_output()
    }

    pub fn is_loading(&self) -> bool {
        self.processing.is_loading()
    }

    /// Summary of the open email; empty until generated.
    pub fn summary(&self) -> String {
        self.host.email_cell().get().summary
    }

    /// Re-reads the host after an item switch and updates the mode.
    pub async fn handle_item_changed(&self) {
        if let Err(e) = self.host.refresh_snapshots().await {
            tracing::warn!(error = %e, "Could not refresh snapshots after item change");
        }
        let compose_mode = self.host.is_compose_mode();
        let changed = self.lock_state().set_compose_mode(compose_mode);

        self.events.publish(AppEvent::ItemChanged);
        if changed {
            self.events.publish(AppEvent::ModeChanged { compose_mode });
        }
    }

    /// Runs the selected action against the current item.
    pub async fn run_action(
        &self,
        instruction: Option<&str>,
        recipient_name: Option<&str>,
    ) -> Result<String, ProcessingError> {
        let (action, settings, compose_mode) = {
            let state = self.lock_state();
            (
                state.current_action,
                state.settings.clone(),
                state.effective_compose_mode(),
            )
        };

        let (email_generation, email) = self.host.email_cell().snapshot();
        let (compose_generation, compose) = self.host.compose_cell().snapshot();
        let (source, generation) = if compose_mode {
            (
                ActionSource::Compose(self.host.compose_cell().clone()),
                compose_generation,
            )
        } else {
            (
                ActionSource::Email(self.host.email_cell().clone()),
                email_generation,
            )
        };

        let input = ActionInput {
            action,
            instruction: instruction.map(str::to_string),
            recipient_name: recipient_name.map(str::to_string),
            settings,
            compose_mode,
            email,
            compose,
            source,
            generation,
        };

        let result = self.processing.run_action(input).await;
        if !matches!(result, Err(ProcessingError::Busy)) {
            self.events.publish(AppEvent::ProcessingFinished {
                action,
                success: result.is_ok(),
            });
        }
        result
    }

    /// Selects an action for the next run. Returns whether it was accepted.
    pub fn select_action(&self, action: Action) -> bool {
        let accepted = self.lock_state().select_action(action);
        if accepted {
            self.events.publish(AppEvent::ActionSelected(action));
        } else {
            tracing::debug!(%action, "Action not available in the current mode");
        }
        accepted
    }

    /// Overrides the host compose flag, e.g. from a launch parameter.
    pub fn force_compose_mode(&self, forced: Option<bool>) {
        let (changed, compose_mode) = {
            let mut state = self.lock_state();
            (state.force_compose_mode(forced), state.effective_compose_mode())
        };
        if changed {
            self.events.publish(AppEvent::ModeChanged { compose_mode });
        }
    }

    /// Applies new generation settings and persists them.
    pub fn update_settings(&self, generation: GenerationSettings) -> Result<(), AppError> {
        let generation = generation.normalized();
        self.lock_state().update_settings(generation.clone());

        let mut settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        settings.generation = generation;
        if let Some(path) = &self.settings_path {
            settings.save(path)?;
        }
        drop(settings);

        self.events.publish(AppEvent::SettingsUpdated);
        Ok(())
    }

    /// Shows or hides the summary panel.
    ///
    /// Opening the panel for an email without a summary generates one.
    /// Returns the new visibility.
    pub async fn toggle_summary(&self) -> Result<bool, ProcessingError> {
        let (visible, compose_mode, settings) = {
            let mut state = self.lock_state();
            let visible = state.toggle_summary();
            (visible, state.effective_compose_mode(), state.settings.clone())
        };

        if visible && !compose_mode && self.summary().is_empty() {
            self.generate_summary(&settings).await?;
        }
        Ok(visible)
    }

    /// Recomputes the summary of the open email.
    pub async fn refresh_summary(&self) -> Result<SummaryOutcome, ProcessingError> {
        let settings = self.lock_state().settings.clone();
        self.generate_summary(&settings).await
    }

    async fn generate_summary(
        &self,
        settings: &GenerationSettings,
    ) -> Result<SummaryOutcome, ProcessingError> {
        let outcome = self
            .processing
            .generate_summary(self.host.email_cell(), settings)
            .await?;
        if matches!(outcome, SummaryOutcome::Applied(_)) {
            self.events.publish(AppEvent::SummaryUpdated);
        }
        Ok(outcome)
    }

    /// Copies the generated text and returns the status message.
    pub async fn copy_output(&self) -> String {
        let output = self.processing.last_output();
        let Some(text) = output.text() else {
            return self.notify(NOTHING_TO_USE, false);
        };

        match self.clipboard.copy(text).await {
            Ok(_) => self.notify(COPY_OK, true),
            Err(e) => {
                let message = ProcessingError::Clipboard(e.to_string()).user_message();
                self.notify(&message, false)
            }
        }
    }

    /// Writes the generated text into the draft or a reply form and returns
    /// the status message.
    pub async fn insert_output(&self) -> String {
        let output = self.processing.last_output();
        let Some(text) = output.text() else {
            return self.notify(NOTHING_TO_USE, false);
        };

        let compose_mode = self.lock_state().effective_compose_mode();
        let result = if compose_mode {
            self.host.insert_compose_text(text).await.map(|()| INSERTED_DRAFT)
        } else {
            self.host.insert_reply_text(text).await.map(|()| INSERTED_REPLY)
        };

        match result {
            Ok(message) => self.notify(message, true),
            Err(e) => {
                tracing::warn!(error = %e, compose_mode, "Inserting output failed");
                self.notify(INSERT_FAILED, false)
            }
        }
    }

    /// Sets recipients and subject of the open draft.
    pub async fn update_draft_header(
        &self,
        to: &[String],
        subject: &str,
    ) -> Result<(), ProcessingError> {
        self.host.set_draft_header(to, subject).await?;
        Ok(())
    }

    /// Stores the API key and reconfigures the completion client.
    pub async fn submit_api_key(&self, api_key: &str) -> Result<&'static str, AppError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AppError::EmptyApiKey);
        }

        let completion = self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .completion
            .clone();
        self.secrets
            .store(&KeychainAccess::ai_api_key(&completion.provider), api_key)
            .await?;

        let provider =
            OpenAiCompatibleProvider::from_settings(&completion, Some(api_key.to_string()));
        self.processing.client().replace_provider(Arc::new(provider));
        self.lock_state().show_api_key_input = false;

        tracing::info!(provider = %completion.provider, "API key configured");
        Ok(API_KEY_SAVED)
    }

    pub fn complete_tutorial(&self) -> Result<(), AppError> {
        self.finish_tutorial()
    }

    pub fn skip_tutorial(&self) -> Result<(), AppError> {
        self.finish_tutorial()
    }

    fn finish_tutorial(&self) -> Result<(), AppError> {
        self.flags.set(TUTORIAL_COMPLETED)?;
        self.lock_state().show_tutorial = false;
        Ok(())
    }

    /// Shows the data-protection notice.
    pub fn privacy_notice(&self) -> &'static str {
        self.events
            .publish(AppEvent::ShowNotification(Notification::info(PRIVACY_NOTICE)));
        PRIVACY_NOTICE
    }

    fn notify(&self, message: &str, success: bool) -> String {
        let notification = if success {
            Notification::success(message)
        } else {
            Notification::error(message)
        };
        self.events.publish(AppEvent::ShowNotification(notification));
        message.to_string()
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(watcher) = self
            .watcher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watcher.abort();
        }
    }
}

async fn watch_items(host: Arc<MailHostService>, app: Weak<App>) {
    loop {
        host.next_item_change().await;
        let Some(app) = app.upgrade() else {
            break;
        };
        app.handle_item_changed().await;
    }
}

/// Picks the API key: environment override first, then the secret store.
///
/// Returns `None` when neither has one; there is no built-in fallback key.
pub async fn resolve_api_key(
    env_value: Option<String>,
    secrets: &dyn SecretStore,
    completion: &CompletionSettings,
) -> Option<String> {
    if let Some(key) = env_value.filter(|key| !key.trim().is_empty()) {
        tracing::debug!("Using API key from {API_KEY_ENV}");
        return Some(key.trim().to_string());
    }

    match secrets
        .retrieve(&KeychainAccess::ai_api_key(&completion.provider))
        .await
    {
        Ok(key) => key.filter(|key| !key.trim().is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read API key from keychain");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySecretStore;

    #[tokio::test]
    async fn env_key_wins_over_store() {
        let store = MemorySecretStore::new();
        store.store("ai.api_key.perplexity", "stored").await.unwrap();

        let key = resolve_api_key(
            Some(" from-env ".to_string()),
            &store,
            &CompletionSettings::default(),
        )
        .await;
        assert_eq!(key.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn stored_key_is_used_without_env() {
        let store = MemorySecretStore::new();
        store.store("ai.api_key.perplexity", "stored").await.unwrap();

        let key = resolve_api_key(None, &store, &CompletionSettings::default()).await;
        assert_eq!(key.as_deref(), Some("stored"));
    }

    #[tokio::test]
    async fn no_key_anywhere_stays_unconfigured() {
        let key = resolve_api_key(
            Some("  ".to_string()),
            &MemorySecretStore::new(),
            &CompletionSettings::default(),
        )
        .await;
        assert_eq!(key, None);
    }
}
