//! Signaling vocabulary shared by every transport backend.
//!
//! [`Outbound`] is what the engine hands a transport; [`TransportEvent`] is
//! what a transport hands back. Backends that speak the relay wire format
//! convert through [`Outbound::to_frame`] and [`TransportEvent::from_frame`];
//! the in-process hub routes the values directly.

use std::sync::atomic::{AtomicI64, Ordering};

use frames::Frame;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::ids::{PeerId, RoomId, StreamId};
use crate::state::{DeskItem, WhiteboardAction};

// =============================================================================
// SYSCALLS
// =============================================================================

pub const SESSION_CONNECTED: &str = "session:connected";
pub const ROOM_JOIN: &str = "room:join";
pub const ROOM_LEAVE: &str = "room:leave";
pub const PEER_JOINED: &str = "peer:joined";
pub const PEER_LEFT: &str = "peer:left";
pub const SIGNAL_RELAY: &str = "signal:relay";
pub const PRESENCE_UPDATE: &str = "presence:update";
pub const WHITEBOARD_ACTION: &str = "whiteboard:action";

// =============================================================================
// CLOCK
// =============================================================================

static LAST_TS: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing millisecond timestamp for locally authored updates.
///
/// Wall-clock based so timestamps from different peers are comparable, but
/// never repeats within a process even when called twice in one millisecond.
pub fn next_ts() -> i64 {
    let now = frames::now_ms();
    let mut prev = LAST_TS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_TS.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

// =============================================================================
// SIGNALS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

/// WebRTC-style negotiation message relayed to exactly one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    #[serde(default)]
    pub payload: Value,
}

impl Signal {
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: SignalKind::Offer, payload: json!({ "sdp": sdp.into() }) }
    }

    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: SignalKind::Answer, payload: json!({ "sdp": sdp.into() }) }
    }

    #[must_use]
    pub fn candidate(candidate: Value) -> Self {
        Self { kind: SignalKind::Candidate, payload: candidate }
    }

    /// Session description carried by an offer or answer.
    #[must_use]
    pub fn sdp(&self) -> Option<&str> {
        self.payload.get("sdp").and_then(Value::as_str)
    }
}

// =============================================================================
// PRESENCE
// =============================================================================

/// Partial presence: absent fields leave the receiver's copy untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_off: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decorations: Option<Vec<DeskItem>>,
}

impl PresencePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One presence broadcast. The stream hints are always sent: a `None`
/// screen hint is how a peer says "not sharing".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    #[serde(flatten)]
    pub patch: PresencePatch,
    #[serde(default)]
    pub camera_stream: Option<StreamId>,
    #[serde(default)]
    pub screen_stream: Option<StreamId>,
    #[serde(default)]
    pub ts: i64,
}

// =============================================================================
// ENGINE <-> TRANSPORT
// =============================================================================

/// Messages the engine asks a transport to deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Join { room: RoomId, presence: PresenceUpdate },
    /// Deliver-to-one.
    Signal { to: PeerId, signal: Signal },
    /// Deliver-to-room, excluding the sender.
    Presence(PresenceUpdate),
    /// Deliver-to-room, excluding the sender.
    Whiteboard(WhiteboardAction),
    Leave,
}

/// Messages a transport hands to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    PeerJoined { peer: PeerId, presence: Option<PresenceUpdate> },
    PeerLeft { peer: PeerId },
    Signal { from: PeerId, signal: Signal },
    Presence { from: PeerId, update: PresenceUpdate },
    Whiteboard { from: PeerId, action: WhiteboardAction },
    /// The signaling channel is gone. Terminal.
    Closed { reason: String },
}

impl TransportEvent {
    /// Remote peer this event is evidence of, if any.
    #[must_use]
    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            Self::PeerJoined { peer, .. } | Self::PeerLeft { peer } => Some(peer),
            Self::Signal { from, .. } | Self::Presence { from, .. } | Self::Whiteboard { from, .. } => Some(from),
            Self::Closed { .. } => None,
        }
    }
}

// =============================================================================
// FRAME MAPPING
// =============================================================================

impl Outbound {
    /// Encode as a relay request frame scoped to `room`.
    #[must_use]
    pub fn to_frame(&self, room: &RoomId) -> Frame {
        let frame = match self {
            Self::Join { room, presence } => {
                Frame::request(ROOM_JOIN, json!({ "presence": presence })).with_room(room.as_str())
            }
            Self::Signal { to, signal } => {
                Frame::request(SIGNAL_RELAY, serde_json::to_value(signal).unwrap_or_default()).with_to(to.as_str())
            }
            Self::Presence(update) => Frame::request(PRESENCE_UPDATE, serde_json::to_value(update).unwrap_or_default()),
            Self::Whiteboard(action) => Frame::request(WHITEBOARD_ACTION, json!({ "action": action })),
            Self::Leave => Frame::request(ROOM_LEAVE, Value::Null),
        };
        if frame.room_id.is_some() { frame } else { frame.with_room(room.as_str()) }
    }
}

impl TransportEvent {
    /// Decode a relay-originated frame. Unknown syscalls, replies, and
    /// malformed payloads yield `None`.
    #[must_use]
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if frame.status != frames::Status::Request {
            return None;
        }
        let event = match frame.syscall.as_str() {
            PEER_JOINED => Self::PeerJoined {
                peer: PeerId::new(frame.str_field("peer_id")?),
                presence: frame.data.get("presence").and_then(|p| serde_json::from_value(p.clone()).ok()),
            },
            PEER_LEFT => Self::PeerLeft { peer: PeerId::new(frame.str_field("peer_id")?) },
            SIGNAL_RELAY => Self::Signal { from: sender(frame)?, signal: decode(frame, &frame.data)? },
            PRESENCE_UPDATE => Self::Presence { from: sender(frame)?, update: decode(frame, &frame.data)? },
            WHITEBOARD_ACTION => Self::Whiteboard { from: sender(frame)?, action: decode(frame, frame.data.get("action")?)? },
            _ => {
                debug!(syscall = %frame.syscall, "ignoring unrecognized frame");
                return None;
            }
        };
        Some(event)
    }
}

fn sender(frame: &Frame) -> Option<PeerId> {
    frame.from.as_deref().filter(|f| !f.is_empty()).map(PeerId::new)
}

fn decode<T: serde::de::DeserializeOwned>(frame: &Frame, value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(syscall = %frame.syscall, error = %e, "dropping malformed payload");
            None
        }
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
