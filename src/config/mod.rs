//! Configuration and settings management.
//!
//! This module provides the add-in settings types and their persistence.
//! Settings are stored in the user's config directory as JSON.

mod settings;

pub use settings::{
    CompletionSettings, ConfigError, GenerationSettings, HostSettings, Length, Salutation,
    Settings, Tone, DEFAULT_LANGUAGE, DEFAULT_REGION,
};
