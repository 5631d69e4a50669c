//! Provider implementations for external collaborators.
//!
//! - [`ai`] - Chat-completion providers (OpenAI-compatible endpoints)
//! - [`mail`] - Mail host capability and its offline stand-in

pub mod ai;
pub mod mail;
