//! Connection manager: one media connection per remote peer, full mesh.
//!
//! ARCHITECTURE
//! ============
//! Links are a keyed collection of independent workers, not a graph. Each
//! [`PeerLink`] owns a task that executes its peer's negotiation commands
//! serially, so an offer in flight for peer A never blocks signals for
//! peer B, and commands for one peer keep their order.
//!
//! Roles: the peer already in the room offers; the joiner answers. An
//! `offer` from an unknown peer creates the connection on the spot.
//! Adding or removing a local stream re-offers on every link.
//!
//! ERROR HANDLING
//! ==============
//! Negotiation failures are logged and reported as `LinkState::Failed` for
//! that peer only. Nothing is retried; leave and rejoin is the recovery.
//! Signals that cannot apply (answer/candidate for an unknown peer, offer
//! without a description) are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ids::{PeerId, StreamId};
use crate::media::MediaStreamHandle;
use crate::peer::{ConnectionEvent, ConnectionEvents, LinkState, NegotiationError, PeerConnection, PeerConnector};
use crate::protocol::{Outbound, Signal, SignalKind};
use crate::transport::Outbox;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug)]
enum LinkCommand {
    Offer,
    RemoteOffer(String),
    RemoteAnswer(String),
    RemoteCandidate(Value),
    AddStream(MediaStreamHandle),
    RemoveStream(StreamId),
}

struct PeerLink {
    connection: Arc<dyn PeerConnection>,
    commands: mpsc::UnboundedSender<LinkCommand>,
    task: JoinHandle<()>,
}

impl PeerLink {
    fn send(&self, peer: &PeerId, command: LinkCommand) {
        if self.commands.send(command).is_err() {
            debug!(%peer, "connection: worker gone, command dropped");
        }
    }
}

pub struct ConnectionManager {
    connector: Arc<dyn PeerConnector>,
    outbox: Outbox,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    links: HashMap<PeerId, PeerLink>,
    local_streams: Vec<MediaStreamHandle>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(connector: Arc<dyn PeerConnector>, outbox: Outbox, events: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self { connector, outbox, events, links: HashMap::new(), local_streams: Vec::new() }
    }

    #[must_use]
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.links.contains_key(peer)
    }

    /// Peers with a live connection, sorted.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.links.keys().cloned().collect();
        peers.sort();
        peers
    }

    #[must_use]
    pub fn local_streams(&self) -> &[MediaStreamHandle] {
        &self.local_streams
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Allocate the connection to `peer` with every current local stream
    /// registered. No-op when one exists.
    ///
    /// # Errors
    ///
    /// Returns the connector's error; the peer is also reported `Failed`.
    pub fn create_connection(&mut self, peer: &PeerId) -> Result<(), NegotiationError> {
        if self.links.contains_key(peer) {
            return Ok(());
        }
        let sink = ConnectionEvents::new(peer.clone(), self.events.clone(), self.outbox.clone());
        let connection = match self.connector.connect(peer, sink.clone()) {
            Ok(c) => c,
            Err(e) => {
                warn!(%peer, error = %e, "connection: allocation failed");
                sink.state(LinkState::Failed);
                return Err(e);
            }
        };
        for stream in &self.local_streams {
            connection.add_stream(stream);
        }

        sink.state(LinkState::Connecting);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(peer.clone(), Arc::clone(&connection), self.outbox.clone(), sink, rx));
        self.links.insert(peer.clone(), PeerLink { connection, commands: tx, task });
        info!(%peer, streams = self.local_streams.len(), "connection: created");
        Ok(())
    }

    /// Create the connection to `peer` (if needed) and send it an offer.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when the connection cannot be allocated.
    pub fn initiate(&mut self, peer: &PeerId) -> Result<(), NegotiationError> {
        self.create_connection(peer)?;
        if let Some(link) = self.links.get(peer) {
            link.send(peer, LinkCommand::Offer);
        }
        Ok(())
    }

    /// Route a negotiation signal from `from` to its connection.
    pub fn handle_signal(&mut self, from: &PeerId, signal: Signal) {
        let command = match signal.kind {
            SignalKind::Offer => {
                let Some(sdp) = signal.sdp() else {
                    debug!(peer = %from, "connection: offer without sdp dropped");
                    return;
                };
                let sdp = sdp.to_owned();
                if self.create_connection(from).is_err() {
                    return;
                }
                LinkCommand::RemoteOffer(sdp)
            }
            SignalKind::Answer => {
                let Some(sdp) = signal.sdp() else {
                    debug!(peer = %from, "connection: answer without sdp dropped");
                    return;
                };
                LinkCommand::RemoteAnswer(sdp.to_owned())
            }
            SignalKind::Candidate => LinkCommand::RemoteCandidate(signal.payload),
        };
        match self.links.get(from) {
            Some(link) => link.send(from, command),
            None => debug!(peer = %from, kind = ?signal.kind, "connection: signal for unknown peer dropped"),
        }
    }

    /// Close and forget the connection to `peer`. Other links are untouched.
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        let Some(link) = self.links.remove(peer) else {
            return false;
        };
        link.task.abort();
        let connection = link.connection;
        tokio::spawn(async move { connection.close().await });
        info!(%peer, "connection: removed");
        true
    }

    /// Close every connection. Safe while negotiations are in flight.
    pub async fn close_all(&mut self) {
        for (peer, link) in self.links.drain() {
            link.task.abort();
            link.connection.close().await;
            debug!(%peer, "connection: closed");
        }
    }

    // =========================================================================
    // RENEGOTIATION
    // =========================================================================

    /// Start sending `stream` to every peer; each link re-offers.
    pub fn add_local_stream(&mut self, stream: MediaStreamHandle) {
        self.local_streams.retain(|s| s.id != stream.id);
        self.local_streams.push(stream.clone());
        for (peer, link) in &self.links {
            link.send(peer, LinkCommand::AddStream(stream.clone()));
            link.send(peer, LinkCommand::Offer);
        }
    }

    /// Stop sending stream `id`; each link re-offers. Returns whether it was sent.
    pub fn remove_local_stream(&mut self, id: &StreamId) -> bool {
        let before = self.local_streams.len();
        self.local_streams.retain(|s| s.id != *id);
        if self.local_streams.len() == before {
            return false;
        }
        for (peer, link) in &self.links {
            link.send(peer, LinkCommand::RemoveStream(id.clone()));
            link.send(peer, LinkCommand::Offer);
        }
        true
    }

    /// Refresh a local stream's description (track enable flags) without
    /// renegotiating.
    pub fn update_local_stream(&mut self, stream: &MediaStreamHandle) {
        if let Some(slot) = self.local_streams.iter_mut().find(|s| s.id == stream.id) {
            slot.clone_from(stream);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        for link in self.links.values() {
            link.task.abort();
        }
    }
}

// =============================================================================
// WORKER
// =============================================================================

async fn run_link(
    peer: PeerId,
    connection: Arc<dyn PeerConnection>,
    outbox: Outbox,
    events: ConnectionEvents,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
) {
    while let Some(command) = commands.recv().await {
        let step = command_name(&command);
        let result = match command {
            LinkCommand::Offer => connection.offer().await.map(|sdp| {
                outbox.send(Outbound::Signal { to: peer.clone(), signal: Signal::offer(sdp) });
            }),
            LinkCommand::RemoteOffer(sdp) => connection.accept_offer(&sdp).await.map(|answer| {
                outbox.send(Outbound::Signal { to: peer.clone(), signal: Signal::answer(answer) });
            }),
            LinkCommand::RemoteAnswer(sdp) => connection.accept_answer(&sdp).await,
            LinkCommand::RemoteCandidate(candidate) => connection.add_ice_candidate(&candidate).await,
            LinkCommand::AddStream(stream) => {
                connection.add_stream(&stream);
                Ok(())
            }
            LinkCommand::RemoveStream(id) => {
                connection.remove_stream(&id);
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(%peer, step, error = %e, "connection: negotiation failed");
            events.state(LinkState::Failed);
        }
    }
}

fn command_name(command: &LinkCommand) -> &'static str {
    match command {
        LinkCommand::Offer => "offer",
        LinkCommand::RemoteOffer(_) => "accept_offer",
        LinkCommand::RemoteAnswer(_) => "accept_answer",
        LinkCommand::RemoteCandidate(_) => "add_ice_candidate",
        LinkCommand::AddStream(_) => "add_stream",
        LinkCommand::RemoveStream(_) => "remove_stream",
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
