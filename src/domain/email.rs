//! Email and draft snapshots held in UI state.
//!
//! Snapshots are point-in-time copies of host fields. They live in
//! [`SnapshotCell`]s whose generation is bumped on every refresh, so that a
//! write computed against an older copy can be detected and dropped.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// The message currently open in read mode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmailSnapshot {
    pub subject: String,
    /// Sender email address.
    pub sender: String,
    /// Plain-text body.
    pub content: String,
    /// Generated summary, empty until requested.
    pub summary: String,
    /// Host item identifier, if the host exposes one.
    pub item_id: Option<String>,
}

/// The draft currently being composed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComposeSnapshot {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    /// What the new message should achieve.
    pub purpose: String,
}

/// Monotonic version of a [`SnapshotCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

#[derive(Debug)]
struct Versioned<T> {
    generation: Generation,
    value: T,
}

/// Shared, versioned snapshot.
///
/// Cloning the cell shares the underlying value.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    inner: Arc<RwLock<Versioned<T>>>,
}

impl<T> Clone for SnapshotCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Versioned {
                generation: Generation::default(),
                value,
            })),
        }
    }

    /// Returns a copy of the value together with its generation.
    pub fn snapshot(&self) -> (Generation, T) {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (guard.generation, guard.value.clone())
    }

    /// Returns a copy of the value.
    pub fn get(&self) -> T {
        self.snapshot().1
    }

    pub fn generation(&self) -> Generation {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Replaces the value with a fresh copy from the host and bumps the
    /// generation.
    pub fn replace(&self, value: T) -> Generation {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.generation = Generation(guard.generation.0 + 1);
        guard.value = value;
        guard.generation
    }

    /// Bumps the generation without touching the value, marking every
    /// outstanding snapshot as stale.
    pub fn invalidate(&self) -> Generation {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.generation = Generation(guard.generation.0 + 1);
        guard.generation
    }

    /// Applies `update` only if the cell is still at `generation`.
    ///
    /// Returns `false` when the snapshot was refreshed in the meantime.
    pub fn update_if_current(&self, generation: Generation, update: impl FnOnce(&mut T)) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if guard.generation != generation {
            return false;
        }
        update(&mut guard.value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_bumps_generation() {
        let cell = SnapshotCell::new(EmailSnapshot::default());
        assert_eq!(cell.generation(), Generation(0));

        let next = cell.replace(EmailSnapshot {
            subject: "Neu".to_string(),
            ..Default::default()
        });

        assert_eq!(next, Generation(1));
        assert_eq!(cell.get().subject, "Neu");
    }

    #[test]
    fn update_applies_at_current_generation() {
        let cell = SnapshotCell::new(EmailSnapshot::default());
        let (generation, _) = cell.snapshot();

        assert!(cell.update_if_current(generation, |email| email.summary = "• A".to_string()));
        assert_eq!(cell.get().summary, "• A");
    }

    #[test]
    fn update_is_dropped_after_refresh() {
        let cell = SnapshotCell::new(EmailSnapshot::default());
        let (generation, _) = cell.snapshot();
        cell.replace(EmailSnapshot::default());

        assert!(!cell.update_if_current(generation, |email| email.summary = "stale".to_string()));
        assert!(cell.get().summary.is_empty());
    }

    #[test]
    fn default_cell_starts_at_generation_zero() {
        let cell: SnapshotCell<EmailSnapshot> = SnapshotCell::default();

        assert_eq!(cell.generation(), Generation(0));
        assert_eq!(cell.get(), EmailSnapshot::default());
    }

    #[test]
    fn clones_share_state() {
        let cell = SnapshotCell::new(ComposeSnapshot::default());
        let other = cell.clone();
        other.replace(ComposeSnapshot {
            subject: "Hallo".to_string(),
            ..Default::default()
        });

        assert_eq!(cell.get().subject, "Hallo");
        assert_eq!(cell.generation(), other.generation());
    }
}
