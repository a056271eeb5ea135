//! Churn debouncer: a `peer-left` is only believed after a quiet grace period.
//!
//! Each provisional departure spawns one timer task. When it fires it posts
//! an [`Expired`] notice to the session loop, which calls
//! [`ChurnDebouncer::confirm`] before acting. Confirmation checks the
//! generation so a notice already in flight when the peer showed signs of
//! life is discarded.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::ids::PeerId;

/// Grace timer fired for `peer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub peer: PeerId,
    generation: u64,
}

struct Pending {
    generation: u64,
    task: JoinHandle<()>,
}

pub struct ChurnDebouncer {
    grace: Duration,
    pending: HashMap<PeerId, Pending>,
    next_generation: u64,
    expired: mpsc::UnboundedSender<Expired>,
}

impl ChurnDebouncer {
    /// Create a debouncer and the receiver its expiry notices arrive on.
    #[must_use]
    pub fn new(grace: Duration) -> (Self, mpsc::UnboundedReceiver<Expired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { grace, pending: HashMap::new(), next_generation: 0, expired: tx }, rx)
    }

    /// Start the grace timer for `peer`. A timer already running is kept
    /// as-is. Returns whether a new timer was started.
    pub fn peer_left(&mut self, peer: &PeerId) -> bool {
        if self.pending.contains_key(peer) {
            debug!(%peer, "debounce: departure already pending");
            return false;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        let grace = self.grace;
        let deadline = tokio::time::Instant::now() + grace;
        let tx = self.expired.clone();
        let notice = Expired { peer: peer.clone(), generation };
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(notice);
        });
        self.pending.insert(peer.clone(), Pending { generation, task });
        debug!(%peer, grace_ms = grace.as_millis(), "debounce: departure pending");
        true
    }

    /// Evidence that `peer` is still here. Returns whether a timer was cancelled.
    pub fn observe(&mut self, peer: &PeerId) -> bool {
        let Some(pending) = self.pending.remove(peer) else {
            return false;
        };
        pending.task.abort();
        info!(%peer, "debounce: departure cancelled, peer still present");
        true
    }

    /// Consume an expiry notice. True when the departure stands.
    pub fn confirm(&mut self, expired: &Expired) -> bool {
        match self.pending.get(&expired.peer) {
            Some(p) if p.generation == expired.generation => {
                self.pending.remove(&expired.peer);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self, peer: &PeerId) -> bool {
        self.pending.contains_key(peer)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Cancel every outstanding timer.
    pub fn clear(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.task.abort();
        }
    }
}

impl Drop for ChurnDebouncer {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
#[path = "debounce_test.rs"]
mod tests;
