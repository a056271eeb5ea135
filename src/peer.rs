//! Per-peer media connection boundary.
//!
//! ARCHITECTURE
//! ============
//! The engine never touches SDP or ICE internals. A [`PeerConnector`]
//! builds one [`PeerConnection`] per remote peer and hands it a
//! [`ConnectionEvents`] sink already bound to that peer, so callbacks
//! (ICE candidates, inbound tracks, state changes) arrive tagged with the
//! peer they belong to.
//!
//! ICE candidates skip the engine loop entirely: the sink forwards them
//! straight to the transport, addressed to the peer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::ids::{PeerId, StreamId};
use crate::media::MediaStreamHandle;
use crate::protocol::{Outbound, Signal};
use crate::transport::Outbox;

// =============================================================================
// TYPES
// =============================================================================

/// Lifecycle of one media connection, as shown on the peer's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// ICE/SDP failures. Isolated to one peer's connection.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("invalid session description: {0}")]
    Sdp(String),
    #[error("ice failure: {0}")]
    Ice(String),
    #[error("connection closed")]
    Closed,
}

impl frames::ErrorCode for NegotiationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Sdp(_) => "E_SDP",
            Self::Ice(_) => "E_ICE",
            Self::Closed => "E_CONNECTION_CLOSED",
        }
    }
}

/// Events raised by connections, consumed by the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    TrackReceived { peer: PeerId, stream: MediaStreamHandle },
    TrackRemoved { peer: PeerId, stream_id: StreamId },
    StateChanged { peer: PeerId, state: LinkState },
}

impl ConnectionEvent {
    #[must_use]
    pub fn peer(&self) -> &PeerId {
        match self {
            Self::TrackReceived { peer, .. } | Self::TrackRemoved { peer, .. } | Self::StateChanged { peer, .. } => peer,
        }
    }
}

// =============================================================================
// EVENT SINK
// =============================================================================

/// Callback surface handed to a connection at creation time.
#[derive(Clone)]
pub struct ConnectionEvents {
    peer: PeerId,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    outbox: Outbox,
}

impl ConnectionEvents {
    #[must_use]
    pub fn new(peer: PeerId, events: mpsc::UnboundedSender<ConnectionEvent>, outbox: Outbox) -> Self {
        Self { peer, events, outbox }
    }

    #[must_use]
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// A local ICE candidate was gathered; relay it to the remote peer.
    pub fn ice_candidate(&self, candidate: serde_json::Value) {
        self.outbox.send(Outbound::Signal { to: self.peer.clone(), signal: Signal::candidate(candidate) });
    }

    pub fn track(&self, stream: MediaStreamHandle) {
        self.emit(ConnectionEvent::TrackReceived { peer: self.peer.clone(), stream });
    }

    pub fn track_removed(&self, stream_id: StreamId) {
        self.emit(ConnectionEvent::TrackRemoved { peer: self.peer.clone(), stream_id });
    }

    pub fn state(&self, state: LinkState) {
        self.emit(ConnectionEvent::StateChanged { peer: self.peer.clone(), state });
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!(peer = %self.peer, "connection event dropped: session gone");
        }
    }
}

// =============================================================================
// CONNECTION TRAITS
// =============================================================================

/// One bidirectional media connection to one remote peer.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Create an offer covering the current local streams and apply it locally.
    async fn offer(&self) -> Result<String, NegotiationError>;

    /// Apply a remote offer and return the local answer.
    async fn accept_offer(&self, sdp: &str) -> Result<String, NegotiationError>;

    /// Apply the remote answer to our last offer.
    async fn accept_answer(&self, sdp: &str) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: &serde_json::Value) -> Result<(), NegotiationError>;

    /// Register an outgoing stream. Takes effect at the next offer.
    fn add_stream(&self, stream: &MediaStreamHandle);

    /// Drop an outgoing stream. Takes effect at the next offer.
    fn remove_stream(&self, stream_id: &StreamId);

    async fn close(&self);
}

/// Factory for [`PeerConnection`]s.
pub trait PeerConnector: Send + Sync {
    /// Allocate a connection to `peer`.
    ///
    /// # Errors
    ///
    /// Returns a negotiation error when the connection cannot be allocated.
    fn connect(&self, peer: &PeerId, events: ConnectionEvents) -> Result<Arc<dyn PeerConnection>, NegotiationError>;
}
