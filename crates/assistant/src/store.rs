//! Session state store with reset epochs.
//!
//! Readers take an immutable [`Snapshot`]. Writers go through
//! [`SessionStore::commit`] with the epoch they read, so a completion that
//! arrives after a reset is discarded instead of writing into the new
//! session.

use std::sync::{Arc, RwLock};

use paperdesk_core::error::{Error, Result};
use paperdesk_core::session::Session;
use tracing::debug;

/// An immutable view of the session at one epoch.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub epoch: u64,
    pub session: Arc<Session>,
}

struct Slot {
    session: Arc<Session>,
    epoch: u64,
}

pub struct SessionStore {
    slot: RwLock<Slot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                session: Arc::new(Session::new()),
                epoch: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        Snapshot {
            epoch: slot.epoch,
            session: Arc::clone(&slot.session),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).epoch
    }

    /// Replace the session with an empty one and advance the epoch.
    /// Returns the new epoch.
    pub fn reset(&self) -> u64 {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.session = Arc::new(Session::new());
        slot.epoch += 1;
        debug!(epoch = slot.epoch, "Session reset");
        slot.epoch
    }

    /// Apply `mutate` if no reset happened since `epoch` was read.
    ///
    /// The mutation runs on a private copy when snapshots are still alive,
    /// and is only published when it returns `Ok`: a failed mutation leaves
    /// the stored session untouched.
    pub fn commit<T>(&self, epoch: u64, mutate: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.epoch != epoch {
            debug!(expected = epoch, current = slot.epoch, "Discarding stale completion");
            return Err(Error::Superseded);
        }

        let mut draft = Session::clone(&slot.session);
        let value = mutate(&mut draft)?;
        slot.session = Arc::new(draft);
        Ok(value)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_at_epoch_zero() {
        let store = SessionStore::new();
        let snap = store.snapshot();
        assert_eq!(snap.epoch, 0);
        assert!(!snap.session.has_paper());
    }

    #[test]
    fn commit_publishes_mutation() {
        let store = SessionStore::new();
        let epoch = store.epoch();
        store
            .commit(epoch, |s| s.load_paper("Paper X", "Paper X content"))
            .unwrap();
        assert_eq!(store.snapshot().session.paper_title(), "Paper X");
    }

    #[test]
    fn snapshot_is_not_affected_by_later_commits() {
        let store = SessionStore::new();
        let before = store.snapshot();
        store
            .commit(before.epoch, |s| s.load_paper("P", "text"))
            .unwrap();
        assert!(!before.session.has_paper());
        assert!(store.snapshot().session.has_paper());
    }

    #[test]
    fn stale_commit_is_superseded() {
        let store = SessionStore::new();
        let stale = store.epoch();
        assert_eq!(store.reset(), 1);

        let err = store.commit(stale, |s| s.load_paper("Old", "old text")).unwrap_err();
        assert!(matches!(err, Error::Superseded));
        assert!(!store.snapshot().session.has_paper());
    }

    #[test]
    fn failed_mutation_leaves_session_untouched() {
        let store = SessionStore::new();
        let epoch = store.epoch();
        store.commit(epoch, |s| s.load_paper("P", "text")).unwrap();

        let err = store
            .commit(epoch, |s| {
                s.record_turn("Q1", "A1")?;
                s.record_turn("", "A2")
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.snapshot().session.turns().is_empty());
    }

    #[test]
    fn reset_replaces_session_identity() {
        let store = SessionStore::new();
        let first = store.snapshot().session.id().to_string();
        store.reset();
        assert_ne!(store.snapshot().session.id(), first);
    }
}
