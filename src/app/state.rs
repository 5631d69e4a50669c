//! UI-facing state: mode, selected action, settings and panel toggles.

use crate::config::GenerationSettings;
use crate::domain::Action;
use crate::services::HostStatus;

/// State shared by the add-in panels.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    /// Compose flag as reported by the host.
    pub host_compose_mode: bool,
    /// Overrides the host flag when set.
    pub forced_compose_mode: Option<bool>,
    pub settings: GenerationSettings,
    pub current_action: Action,
    /// Whether the summary panel is expanded.
    pub show_summary: bool,
    /// Whether the first-run tutorial is shown.
    pub show_tutorial: bool,
    /// Whether the API key prompt is shown.
    pub show_api_key_input: bool,
    pub host_status: HostStatus,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            host_compose_mode: false,
            forced_compose_mode: None,
            settings: GenerationSettings::default(),
            current_action: Action::Reply,
            show_summary: false,
            show_tutorial: false,
            show_api_key_input: false,
            host_status: HostStatus::Uninitialized,
        }
    }
}

impl AppState {
    pub fn new(settings: GenerationSettings) -> Self {
        Self {
            settings: settings.normalized(),
            ..Default::default()
        }
    }

    /// Compose mode after applying the override.
    pub fn effective_compose_mode(&self) -> bool {
        self.forced_compose_mode.unwrap_or(self.host_compose_mode)
    }

    /// Records the host compose flag. Returns `true` if the effective mode changed.
    pub fn set_compose_mode(&mut self, compose: bool) -> bool {
        let before = self.effective_compose_mode();
        self.host_compose_mode = compose;
        self.reconcile_action(before)
    }

    /// Sets or clears the override. Returns `true` if the effective mode changed.
    pub fn force_compose_mode(&mut self, forced: Option<bool>) -> bool {
        let before = self.effective_compose_mode();
        self.forced_compose_mode = forced;
        self.reconcile_action(before)
    }

    fn reconcile_action(&mut self, before: bool) -> bool {
        let now = self.effective_compose_mode();
        if now == before {
            return false;
        }
        if now {
            if !self.current_action.available_in_compose() {
                self.current_action = Action::Compose;
            }
        } else if self.current_action == Action::Compose {
            self.current_action = Action::Reply;
        }
        true
    }

    /// Whether `action` can be picked in the current mode.
    pub fn is_available(&self, action: Action) -> bool {
        !self.effective_compose_mode() || action.available_in_compose()
    }

    /// Selects `action` if it is available. Returns whether it was accepted.
    pub fn select_action(&mut self, action: Action) -> bool {
        if !self.is_available(action) {
            return false;
        }
        self.current_action = action;
        true
    }

    pub fn update_settings(&mut self, settings: GenerationSettings) {
        self.settings = settings.normalized();
    }

    /// Flips the summary panel and returns the new visibility.
    pub fn toggle_summary(&mut self) -> bool {
        self.show_summary = !self.show_summary;
        self.show_summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Length, Salutation, Tone};

    #[test]
    fn defaults() {
        let state = AppState::default();
        assert_eq!(state.current_action, Action::Reply);
        assert_eq!(state.settings.tone, Tone::Formal);
        assert_eq!(state.settings.salutation, Salutation::Informal);
        assert_eq!(state.settings.length, Length::Short);
        assert_eq!(state.settings.language, "Deutsch");
        assert!(!state.effective_compose_mode());
    }

    #[test]
    fn entering_compose_switches_to_compose() {
        let mut state = AppState::default();
        assert!(state.set_compose_mode(true));
        assert_eq!(state.current_action, Action::Compose);
    }

    #[test]
    fn entering_compose_keeps_compose_capable_action() {
        let mut state = AppState::default();
        state.select_action(Action::Rephrase);

        state.set_compose_mode(true);
        assert_eq!(state.current_action, Action::Rephrase);
    }

    #[test]
    fn leaving_compose_returns_to_reply() {
        let mut state = AppState::default();
        state.set_compose_mode(true);

        assert!(state.set_compose_mode(false));
        assert_eq!(state.current_action, Action::Reply);
    }

    #[test]
    fn unchanged_mode_is_a_no_op() {
        let mut state = AppState::default();
        state.select_action(Action::Translate);

        assert!(!state.set_compose_mode(false));
        assert_eq!(state.current_action, Action::Translate);
    }

    #[test]
    fn override_wins_over_host_flag() {
        let mut state = AppState::default();
        assert!(state.force_compose_mode(Some(true)));
        assert!(!state.set_compose_mode(false));
        assert!(state.effective_compose_mode());
        assert_eq!(state.current_action, Action::Compose);

        assert!(state.force_compose_mode(None));
        assert_eq!(state.current_action, Action::Reply);
    }

    #[test]
    fn read_only_actions_unavailable_in_compose() {
        let mut state = AppState::default();
        state.set_compose_mode(true);

        assert!(!state.select_action(Action::Summarize));
        assert!(state.select_action(Action::Custom));
        assert_eq!(state.current_action, Action::Custom);
    }

    #[test]
    fn update_settings_normalizes() {
        let mut state = AppState::default();
        state.update_settings(GenerationSettings {
            language: "  ".to_string(),
            ..Default::default()
        });
        assert_eq!(state.settings.language, "Deutsch");
    }

    #[test]
    fn toggle_summary_flips() {
        let mut state = AppState::default();
        assert!(state.toggle_summary());
        assert!(!state.toggle_summary());
    }
}
