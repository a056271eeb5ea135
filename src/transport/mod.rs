//! Transport adapter: the engine's only view of the signaling channel.
//!
//! DESIGN
//! ======
//! A backend must provide three things: deliver-to-one (signals),
//! deliver-to-room (presence, whiteboard), and peer join/leave
//! notification. Opening a transport yields a [`TransportLink`]: the
//! relay-assigned local id, the peers already in the room, a cloneable
//! [`Outbox`], and the inbound event stream.
//!
//! ERROR HANDLING
//! ==============
//! Only `open` can fail. Once open, a broken channel surfaces as a single
//! terminal [`TransportEvent::Closed`]; sends are fire-and-forget and never
//! retried.

pub mod local;
pub mod relay;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::ids::{PeerId, RoomId};
use crate::protocol::{Outbound, PresenceUpdate, TransportEvent};

pub use local::LocalHub;
pub use relay::RelayTransport;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("signaling connect failed: {0}")]
    Connect(String),
    #[error("signaling channel closed")]
    Closed,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("relay rejected {syscall}: {message}")]
    Rejected { syscall: String, message: String },
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
}

impl frames::ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "E_TRANSPORT_CONNECT",
            Self::Closed => "E_TRANSPORT_CLOSED",
            Self::Timeout(_) => "E_TRANSPORT_TIMEOUT",
            Self::Rejected { .. } => "E_TRANSPORT_REJECTED",
            Self::Decode(_) => "E_TRANSPORT_DECODE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_))
    }
}

// =============================================================================
// LINK
// =============================================================================

/// Fire-and-forget handle for outbound signaling.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    /// Queue `msg` for delivery. Returns false once the transport is gone.
    pub fn send(&self, msg: Outbound) -> bool {
        if self.tx.send(msg).is_err() {
            debug!("outbound message dropped: transport closed");
            return false;
        }
        true
    }
}

/// An open signaling channel, joined to one room.
#[derive(Debug)]
pub struct TransportLink {
    pub local_id: PeerId,
    /// Peers already in the room at join time. The local peer offers to each.
    pub existing: Vec<PeerId>,
    pub outbox: Outbox,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Transport: Send {
    /// Connect, join `room` announcing `presence`, and start pumping.
    async fn open(self: Box<Self>, room: &RoomId, presence: PresenceUpdate) -> Result<TransportLink, TransportError>;
}
