//! Add-in settings and configuration types.
//!
//! Settings are persisted to `settings.json` in the platform config directory
//! (e.g. `~/.config/mailaider/settings.json`) and loaded at startup. Every
//! field has a default, so a partial or missing file still yields a fully
//! populated value.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default target language, matching the add-in's working language.
pub const DEFAULT_LANGUAGE: &str = "Deutsch";

/// Default spelling-convention region.
pub const DEFAULT_REGION: &str = "Schweiz";

const SETTINGS_FILE: &str = "settings.json";

/// Errors that can occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no configuration directory available on this platform")]
    NoConfigDir,

    #[error("invalid completion endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Top-level add-in settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// User-adjustable generation parameters.
    pub generation: GenerationSettings,
    /// Completion endpoint configuration.
    pub completion: CompletionSettings,
    /// Mail host behavior.
    pub host: HostSettings,
}

impl Settings {
    /// Returns the default settings path in the platform config directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("ch", "mailaider", "mailaider")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads settings from `path`, falling back to defaults when the file does
    /// not exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Loads and validates settings from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut settings: Settings = serde_json::from_str(&raw)?;
        settings.generation = settings.generation.normalized();
        settings.validate()?;
        Ok(settings)
    }

    /// Writes settings to `path` as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks values that serde cannot constrain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.completion.endpoint()?;

        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside 0.0..=2.0",
                self.completion.temperature
            )));
        }
        if self.completion.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".into()));
        }
        if self.completion.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Generation parameters chosen by the user in the settings panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Writing tone.
    pub tone: Tone,
    /// Du/Sie form of address.
    pub salutation: Salutation,
    /// Target output length.
    pub length: Length,
    /// Language of the generated text.
    pub language: String,
    /// Region whose spelling conventions apply (e.g. "Schweiz" writes "ss" for "ß").
    pub region: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tone: Tone::Formal,
            salutation: Salutation::Informal,
            length: Length::Short,
            language: DEFAULT_LANGUAGE.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

impl GenerationSettings {
    /// Replaces blank free-form fields with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.language.trim().is_empty() {
            self.language = DEFAULT_LANGUAGE.to_string();
        } else {
            self.language = self.language.trim().to_string();
        }
        if self.region.trim().is_empty() {
            self.region = DEFAULT_REGION.to_string();
        } else {
            self.region = self.region.trim().to_string();
        }
        self
    }
}

/// Writing tone for generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Business-appropriate language.
    #[default]
    Formal,
    /// Friendly, conversational language.
    Informal,
    /// Courteous and considerate.
    Polite,
    /// Concise and to the point.
    Direct,
    Neutral,
}

impl Tone {
    /// Label used inside prompts.
    pub fn label(self) -> &'static str {
        match self {
            Tone::Formal => "formell",
            Tone::Informal => "informell",
            Tone::Polite => "höflich",
            Tone::Direct => "direkt",
            Tone::Neutral => "neutral",
        }
    }
}

/// Form of address used towards the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Salutation {
    /// "Du" form.
    #[default]
    Informal,
    /// "Sie" form.
    Formal,
}

impl Salutation {
    pub fn label(self) -> &'static str {
        match self {
            Salutation::Informal => "Du (informell)",
            Salutation::Formal => "Sie (formell)",
        }
    }
}

/// Target length of generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Length {
    #[default]
    Short,
    Medium,
    Long,
}

impl Length {
    pub fn label(self) -> &'static str {
        match self {
            Length::Short => "kurz",
            Length::Medium => "mittel",
            Length::Long => "lang",
        }
    }
}

/// Configuration for the chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Provider name, used to derive the keychain entry for the API key.
    pub provider: String,
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_tokens: usize,
    /// Client-side request timeout in seconds.
    pub timeout_secs: u64,
    /// Header carrying the API key. `None` sends `Authorization: Bearer <key>`.
    pub api_key_header: Option<String>,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            provider: "perplexity".to_string(),
            base_url: "https://api.perplexity.ai".to_string(),
            model: "llama-3.1-sonar-small-128k-online".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout_secs: 20,
            api_key_header: None,
        }
    }
}

impl CompletionSettings {
    /// Parses the configured base URL.
    pub fn endpoint(&self) -> Result<url::Url, ConfigError> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidEndpoint {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(ConfigError::InvalidEndpoint {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }
}

/// Mail host behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// How long to wait for the host to report readiness before degrading.
    pub ready_timeout_secs: u64,
    /// Compose mode reported by the offline host in degraded mode.
    pub offline_compose_mode: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 10,
            offline_compose_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.generation.tone, Tone::Formal);
        assert_eq!(settings.generation.salutation, Salutation::Informal);
        assert_eq!(settings.generation.length, Length::Short);
        assert_eq!(settings.generation.language, "Deutsch");
        assert_eq!(settings.host.ready_timeout_secs, 10);
    }

    #[test]
    fn tone_serialization() {
        let json = serde_json::to_string(&Tone::Polite).unwrap();
        assert_eq!(json, "\"polite\"");

        let tone: Tone = serde_json::from_str("\"direct\"").unwrap();
        assert_eq!(tone, Tone::Direct);
    }

    #[test]
    fn missing_region_resolves_to_default() {
        let generation: GenerationSettings =
            serde_json::from_str(r#"{"tone":"informal","language":"Englisch"}"#).unwrap();

        assert_eq!(generation.tone, Tone::Informal);
        assert_eq!(generation.language, "Englisch");
        assert_eq!(generation.region, DEFAULT_REGION);
    }

    #[test]
    fn blank_fields_are_normalized() {
        let generation = GenerationSettings {
            language: "   ".to_string(),
            region: String::new(),
            ..Default::default()
        }
        .normalized();

        assert_eq!(generation.language, DEFAULT_LANGUAGE);
        assert_eq!(generation.region, DEFAULT_REGION);
    }

    #[test]
    fn labels_match_prompt_vocabulary() {
        assert_eq!(Tone::Polite.label(), "höflich");
        assert_eq!(Salutation::Formal.label(), "Sie (formell)");
        assert_eq!(Length::Medium.label(), "mittel");
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let mut settings = Settings::default();
        settings.completion.base_url = "ftp://example.com".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut settings = Settings::default();
        settings.completion.temperature = 3.5;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn settings_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.generation.tone = Tone::Direct;
        settings.generation.language = "Französisch".to_string();
        settings.completion.api_key_header = Some("api-key".to_string());
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(dir.path().join("missing.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"generation":{"length":"long","region":""}}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.generation.length, Length::Long);
        assert_eq!(settings.generation.region, DEFAULT_REGION);
        assert_eq!(settings.completion, CompletionSettings::default());
    }
}
