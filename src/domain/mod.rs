//! Domain layer types for the mail assistant.
//!
//! This module contains the actions a user can trigger, the request
//! descriptor built for each invocation, and the email/draft snapshots.

mod action;
mod email;

pub use action::{Action, ComposeContext, RequestContent, RequestDescriptor};
pub use email::{ComposeSnapshot, EmailSnapshot, Generation, SnapshotCell};
