//! Same-process broadcast backend.
//!
//! DESIGN
//! ======
//! `LocalHub` plays the relay's role for sessions living in one process:
//! a map of room -> member -> event sender. Each opened transport gets a
//! routing task that drains its outbox and fans messages out under the
//! hub lock, so per-sender ordering matches send order.
//!
//! The hub can also fake trouble: [`LocalHub::flicker`] announces a
//! departure without disconnecting anyone, and [`LocalHub::disconnect`]
//! drops a member hard.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

use super::{Outbox, Transport, TransportError, TransportLink};
use crate::ids::{PeerId, RoomId};
use crate::protocol::{Outbound, PresenceUpdate, TransportEvent};

type Members = HashMap<PeerId, mpsc::UnboundedSender<TransportEvent>>;

/// In-process signaling hub shared by every session it hosts.
#[derive(Clone, Default)]
pub struct LocalHub {
    rooms: Arc<RwLock<HashMap<RoomId, Members>>>,
}

impl LocalHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that gets a random peer id on open.
    #[must_use]
    pub fn transport(&self) -> LocalTransport {
        LocalTransport { hub: self.clone(), peer: None }
    }

    /// A transport with a fixed peer id.
    #[must_use]
    pub fn transport_as(&self, peer: impl Into<PeerId>) -> LocalTransport {
        LocalTransport { hub: self.clone(), peer: Some(peer.into()) }
    }

    /// Current members of `room`, sorted.
    pub async fn peers(&self, room: &RoomId) -> Vec<PeerId> {
        let rooms = self.rooms.read().await;
        let mut peers: Vec<PeerId> = rooms.get(room).map(|m| m.keys().cloned().collect()).unwrap_or_default();
        peers.sort();
        peers
    }

    /// Tell everyone else that `peer` left, while leaving it connected.
    pub async fn flicker(&self, room: &RoomId, peer: &PeerId) {
        self.broadcast(room, peer, &TransportEvent::PeerLeft { peer: peer.clone() }).await;
    }

    /// Drop `peer` from `room`: it receives `Closed`, everyone else `PeerLeft`.
    pub async fn disconnect(&self, room: &RoomId, peer: &PeerId) {
        let removed = self.part(room, peer).await;
        if let Some(tx) = removed {
            let _ = tx.send(TransportEvent::Closed { reason: "disconnected by hub".to_owned() });
        }
    }

    async fn deliver(&self, room: &RoomId, from: &PeerId, to: &PeerId, event: TransportEvent) {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room).filter(|m| m.contains_key(from)) else {
            return;
        };
        match members.get(to) {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => debug!(%room, %from, %to, "hub: signal target not in room"),
        }
    }

    async fn broadcast(&self, room: &RoomId, from: &PeerId, event: &TransportEvent) {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room).filter(|m| m.contains_key(from)) else {
            return;
        };
        for (peer, tx) in members {
            if peer != from {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Remove `peer` and notify the rest. Returns the removed sender.
    async fn part(&self, room: &RoomId, peer: &PeerId) -> Option<mpsc::UnboundedSender<TransportEvent>> {
        let mut rooms = self.rooms.write().await;
        let members = rooms.get_mut(room)?;
        let removed = members.remove(peer)?;
        for tx in members.values() {
            let _ = tx.send(TransportEvent::PeerLeft { peer: peer.clone() });
        }
        if members.is_empty() {
            rooms.remove(room);
        }
        info!(%room, %peer, "hub: peer parted");
        Some(removed)
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

pub struct LocalTransport {
    hub: LocalHub,
    peer: Option<PeerId>,
}

#[async_trait]
impl Transport for LocalTransport {
    async fn open(self: Box<Self>, room: &RoomId, presence: PresenceUpdate) -> Result<TransportLink, TransportError> {
        let Self { hub, peer } = *self;
        let local_id = peer.unwrap_or_else(PeerId::generate);
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let existing = {
            let mut rooms = hub.rooms.write().await;
            let members = rooms.entry(room.clone()).or_default();
            let existing: Vec<PeerId> = members.keys().filter(|p| **p != local_id).cloned().collect();
            for tx in members.values() {
                let _ = tx.send(TransportEvent::PeerJoined { peer: local_id.clone(), presence: Some(presence.clone()) });
            }
            members.insert(local_id.clone(), ev_tx);
            existing
        };

        info!(%room, peer = %local_id, existing = existing.len(), "hub: peer joined");
        tokio::spawn(route(hub, room.clone(), local_id.clone(), out_rx));

        Ok(TransportLink { local_id, existing, outbox: Outbox::new(out_tx), events: ev_rx })
    }
}

async fn route(hub: LocalHub, room: RoomId, peer: PeerId, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(msg) = outbound.recv().await {
        match msg {
            Outbound::Join { .. } => debug!(%room, %peer, "hub: duplicate join ignored"),
            Outbound::Signal { to, signal } => {
                hub.deliver(&room, &peer, &to, TransportEvent::Signal { from: peer.clone(), signal }).await;
            }
            Outbound::Presence(update) => {
                hub.broadcast(&room, &peer, &TransportEvent::Presence { from: peer.clone(), update }).await;
            }
            Outbound::Whiteboard(action) => {
                hub.broadcast(&room, &peer, &TransportEvent::Whiteboard { from: peer.clone(), action }).await;
            }
            Outbound::Leave => break,
        }
    }
    hub.part(&room, &peer).await;
}

#[cfg(test)]
#[path = "local_test.rs"]
mod tests;
