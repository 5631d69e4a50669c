//! mailaider - AI-assisted email processing for a mail-client add-in
//!
//! This crate provides the client-side core of the add-in: reading the open
//! message or draft from the host, building prompts, calling a
//! chat-completion endpoint and writing the result back.

pub mod app;
pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;

pub use app::App;
