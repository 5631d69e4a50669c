//! Local persistence.
//!
//! - OS keychain integration for the completion API key
//! - A JSON flag file for first-run state

mod flags;
mod keychain;

pub use flags::{FlagStore, FlagStoreError, TUTORIAL_COMPLETED};
pub use keychain::{KeychainAccess, KeychainError, MemorySecretStore, SecretStore};
