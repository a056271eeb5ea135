//! Room service: membership and fan-out.
//!
//! DESIGN
//! ======
//! A room is created by its first `join` and evicted with its last `part`.
//! Joining announces `peer:joined` (with the joiner's presence snapshot) to
//! the members already there; parting announces `peer:left`. Delivery is
//! best-effort: a client whose queue is full misses the frame, exactly like
//! a lossy network would.

use frames::Frame;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::{AppState, RoomState};

pub const PEER_JOINED: &str = "peer:joined";
pub const PEER_LEFT: &str = "peer:left";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("join a room first")]
    NotJoined,
    #[error("room id required")]
    MissingRoom,
    #[error("target peer required")]
    MissingTarget,
    #[error("peer {0} is not in this room")]
    UnknownPeer(String),
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
    #[error("malformed frame: {0}")]
    BadFrame(String),
}

impl frames::ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined => "E_NOT_JOINED",
            Self::MissingRoom => "E_MISSING_ROOM",
            Self::MissingTarget => "E_MISSING_TARGET",
            Self::UnknownPeer(_) => "E_UNKNOWN_PEER",
            Self::UnknownSyscall(_) => "E_UNKNOWN_SYSCALL",
            Self::BadFrame(_) => "E_BAD_FRAME",
        }
    }
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Add `peer_id` to `room` and announce it. Returns the members that were
/// already present, sorted.
pub async fn join(state: &AppState, room: &str, peer_id: &str, tx: mpsc::Sender<Frame>, presence: Value) -> Vec<String> {
    let mut rooms = state.rooms.write().await;
    let room_state = rooms.entry(room.to_owned()).or_insert_with(RoomState::new);

    let mut existing: Vec<String> = room_state.peers.keys().filter(|p| *p != peer_id).cloned().collect();
    existing.sort();

    let notice = Frame::request(PEER_JOINED, json!({ "peer_id": peer_id, "presence": presence })).with_room(room);
    fan_out(room_state, &notice, Some(peer_id));
    room_state.peers.insert(peer_id.to_owned(), tx);

    info!(%room, %peer_id, members = room_state.peers.len(), "room: peer joined");
    existing
}

/// Remove `peer_id` from `room`, announce it, and evict the room when empty.
/// Returns false when the peer was not a member.
pub async fn part(state: &AppState, room: &str, peer_id: &str) -> bool {
    let mut rooms = state.rooms.write().await;
    let Some(room_state) = rooms.get_mut(room) else {
        return false;
    };
    if room_state.peers.remove(peer_id).is_none() {
        return false;
    }

    let notice = Frame::request(PEER_LEFT, json!({ "peer_id": peer_id })).with_room(room);
    fan_out(room_state, &notice, None);

    if room_state.peers.is_empty() {
        rooms.remove(room);
        info!(%room, "room: evicted");
    }
    info!(%room, %peer_id, "room: peer parted");
    true
}

/// Current members of `room`, sorted.
pub async fn members(state: &AppState, room: &str) -> Vec<String> {
    let rooms = state.rooms.read().await;
    let mut peers: Vec<String> = rooms.get(room).map(|r| r.peers.keys().cloned().collect()).unwrap_or_default();
    peers.sort();
    peers
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Send `frame` to every member of `room` except `exclude`.
pub async fn broadcast(state: &AppState, room: &str, frame: &Frame, exclude: Option<&str>) {
    let rooms = state.rooms.read().await;
    let Some(room_state) = rooms.get(room) else {
        return;
    };
    fan_out(room_state, frame, exclude);
}

/// Send `frame` to one member of `room`.
///
/// # Errors
///
/// Returns [`RelayError::UnknownPeer`] when `to` is not in the room.
pub async fn send_to(state: &AppState, room: &str, to: &str, frame: &Frame) -> Result<(), RelayError> {
    let rooms = state.rooms.read().await;
    let tx = rooms
        .get(room)
        .and_then(|r| r.peers.get(to))
        .ok_or_else(|| RelayError::UnknownPeer(to.to_owned()))?;
    if tx.try_send(frame.clone()).is_err() {
        warn!(%room, %to, syscall = %frame.syscall, "room: client queue full, frame dropped");
    }
    Ok(())
}

fn fan_out(room_state: &RoomState, frame: &Frame, exclude: Option<&str>) {
    for (peer_id, tx) in &room_state.peers {
        if exclude == Some(peer_id.as_str()) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        if tx.try_send(frame.clone()).is_err() {
            debug!(%peer_id, syscall = %frame.syscall, "room: client queue full, frame dropped");
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
