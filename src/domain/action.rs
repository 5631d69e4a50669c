//! Actions and the per-invocation request descriptor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ComposeSnapshot, EmailSnapshot};
use crate::config::GenerationSettings;

/// The email-processing operation chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Bulleted overview of an existing message.
    Summarize,
    /// Draft a reply to an existing message.
    Reply,
    /// Translate into the target language.
    Translate,
    /// Free-form instruction from the user.
    Custom,
    /// Draft a new email.
    Compose,
    /// Fix style and grammar.
    Correct,
    /// Fix spelling only, keep the style.
    FixSpelling,
    /// Rephrase politely without changing the content.
    Rephrase,
    /// Make the text easier to understand.
    Simplify,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::Summarize,
        Action::Reply,
        Action::Translate,
        Action::Custom,
        Action::Compose,
        Action::Correct,
        Action::FixSpelling,
        Action::Rephrase,
        Action::Simplify,
    ];

    /// Stable identifier, as used in serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Summarize => "summarize",
            Action::Reply => "reply",
            Action::Translate => "translate",
            Action::Custom => "custom",
            Action::Compose => "compose",
            Action::Correct => "correct",
            Action::FixSpelling => "fix_spelling",
            Action::Rephrase => "rephrase",
            Action::Simplify => "simplify",
        }
    }

    /// Whether the action rewrites a piece of text rather than answering it.
    pub fn is_rewrite(self) -> bool {
        matches!(
            self,
            Action::Correct | Action::FixSpelling | Action::Rephrase | Action::Simplify
        )
    }

    /// Whether the action still makes sense while drafting a new message.
    pub fn available_in_compose(self) -> bool {
        matches!(self, Action::Compose | Action::Custom) || self.is_rewrite()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

/// Draft fields handed to the prompt in compose mode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComposeContext {
    pub to: Vec<String>,
    pub subject: String,
    pub purpose: String,
}

/// The single content payload of a request.
///
/// Which variant is used depends on the add-in mode, never on the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestContent {
    /// Plain-text body of the message being read.
    Email(String),
    /// Fields of the message being composed.
    Compose(ComposeContext),
}

impl RequestContent {
    pub fn email_text(&self) -> Option<&str> {
        match self {
            RequestContent::Email(text) => Some(text),
            RequestContent::Compose(_) => None,
        }
    }

    pub fn compose_context(&self) -> Option<&ComposeContext> {
        match self {
            RequestContent::Email(_) => None,
            RequestContent::Compose(context) => Some(context),
        }
    }
}

/// Everything the prompt builder needs for one invocation.
///
/// Built fresh for every action and consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub action: Action,
    pub settings: GenerationSettings,
    /// Free-text instruction; `None` when blank.
    pub instruction: Option<String>,
    /// Name used in the reply greeting.
    pub recipient_name: Option<String>,
    pub content: RequestContent,
}

impl RequestDescriptor {
    /// Assembles a descriptor, picking the payload from `compose_mode`.
    ///
    /// In compose mode the draft purpose is replaced by the user instruction
    /// when one was given.
    pub fn for_mode(
        action: Action,
        settings: GenerationSettings,
        instruction: Option<&str>,
        recipient_name: Option<&str>,
        compose_mode: bool,
        email: &EmailSnapshot,
        compose: &ComposeSnapshot,
    ) -> Self {
        let instruction = non_blank(instruction);
        let recipient_name = non_blank(recipient_name);

        let content = if compose_mode {
            RequestContent::Compose(ComposeContext {
                to: compose.to.clone(),
                subject: compose.subject.clone(),
                purpose: instruction
                    .clone()
                    .unwrap_or_else(|| compose.purpose.clone()),
            })
        } else {
            RequestContent::Email(email.content.clone())
        };

        Self {
            action,
            settings,
            instruction,
            recipient_name,
            content,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
