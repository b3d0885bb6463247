//! Seams to the engine's external collaborators.
//!
//! The block-list service and the notification service live outside this
//! workspace. The engine talks to them through these traits: the block
//! check participates in creation guards, while notification is strictly
//! fire-and-forget — it runs after commit, and a delivery failure is
//! logged and never rolls back or fails the parent operation.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use parley_types::{OfferEvent, UserId};

/// Answers "has `blocker` blocked `blocked`?".
pub trait BlockChecker {
    fn is_blocked(&self, blocker: UserId, blocked: UserId) -> bool;
}

/// Permits everyone. The default for deployments without a block list.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlocks;

impl BlockChecker for NoBlocks {
    fn is_blocked(&self, _blocker: UserId, _blocked: UserId) -> bool {
        false
    }
}

/// In-memory directed block list.
#[derive(Debug, Default)]
pub struct BlockList {
    pairs: HashSet<(UserId, UserId)>,
}

impl BlockList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `blocker` has blocked `blocked`.
    pub fn block(&mut self, blocker: UserId, blocked: UserId) {
        self.pairs.insert((blocker, blocked));
    }

    pub fn unblock(&mut self, blocker: UserId, blocked: UserId) {
        self.pairs.remove(&(blocker, blocked));
    }
}

impl BlockChecker for BlockList {
    fn is_blocked(&self, blocker: UserId, blocked: UserId) -> bool {
        self.pairs.contains(&(blocker, blocked))
    }
}

/// Notification delivery failed. Logged by the engine, never propagated.
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Receives one event per committed state transition.
pub trait Notifier {
    /// Deliver `event` to `recipient`. Must not block on the settlement
    /// path; implementations should enqueue and return.
    fn notify(&self, recipient: UserId, event: &OfferEvent) -> Result<(), NotifyError>;
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _recipient: UserId, _event: &OfferEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Captures notifications in memory, for tests and local development.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<(UserId, OfferEvent)>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in delivery order.
    #[must_use]
    pub fn delivered(&self) -> Vec<(UserId, OfferEvent)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many events of `kind` were delivered.
    #[must_use]
    pub fn count_of(&self, kind: parley_types::OfferEventKind) -> usize {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, e)| e.kind == kind)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: UserId, event: &OfferEvent) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((recipient, event.clone()));
        Ok(())
    }
}
