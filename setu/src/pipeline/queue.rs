//! Bounded hand-off between the ingest and dispatch threads

use crate::routing::Message;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to drop when the queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFullPolicy {
    /// Evict the oldest queued message; newest readings win
    #[default]
    DropOldest,
    /// Reject the incoming message
    DropNewest,
}

/// Result of [`DispatchQueue::push`]
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting this message
    DroppedOldest(Message),
    /// Not queued
    DroppedNewest(Message),
}

/// Bounded FIFO of routed messages
///
/// Clones share the same channel. The ingest side pushes, the dispatch side
/// receives; eviction under [`QueueFullPolicy::DropOldest`] happens on the
/// push side, so order is preserved for everything that survives.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: Sender<Message>,
    rx: Receiver<Message>,
    policy: QueueFullPolicy,
}

impl DispatchQueue {
    pub fn new(capacity: usize, policy: QueueFullPolicy) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self { tx, rx, policy }
    }

    pub fn policy(&self) -> QueueFullPolicy {
        self.policy
    }

    /// Enqueue without blocking
    pub fn push(&self, message: Message) -> PushOutcome {
        let mut message = message;
        let mut evicted = None;

        loop {
            match self.tx.try_send(message) {
                Ok(()) => {
                    return match evicted {
                        Some(old) => PushOutcome::DroppedOldest(old),
                        None => PushOutcome::Queued,
                    };
                }
                Err(TrySendError::Full(rejected)) => match self.policy {
                    QueueFullPolicy::DropNewest => return PushOutcome::DroppedNewest(rejected),
                    QueueFullPolicy::DropOldest => {
                        // The consumer may have drained it in the meantime; retry either way
                        if let Ok(old) = self.rx.try_recv() {
                            evicted.get_or_insert(old);
                        }
                        message = rejected;
                    }
                },
                // Both ends live in `self`
                Err(TrySendError::Disconnected(rejected)) => {
                    return PushOutcome::DroppedNewest(rejected);
                }
            }
        }
    }

    /// Wait up to `timeout` for the next message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Message> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}
