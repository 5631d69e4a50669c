//! Mail host bindings.
//!
//! [`MailHostPort`] is the capability the embedding host provides.
//! [`OfflineMailHost`] stands in when no host is reachable.

mod offline;
mod traits;

pub use offline::{DiscardedWrite, OfflineMailHost};
#[cfg(test)]
pub use traits::MockMailHostPort;
pub use traits::{
    HostDraft, HostError, HostMessage, HostResult, ItemChangedHandler, MailHostPort,
};
