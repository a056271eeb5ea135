//! Stream classifier: decides which record an inbound stream belongs to.
//!
//! This is a best-effort inference. Nothing negotiated ties a stream to
//! "camera" or "screen"; the classifier uses, in order:
//!
//! 1. the peer's stream hints from presence, when they name this stream;
//! 2. arrival order: the first stream is the primary feed, a second,
//!    different stream is the screen share.
//!
//! It assumes at most two simultaneous inbound streams per peer. A later
//! presence update re-binds whatever the heuristic got wrong (see
//! `PresenceStore::apply_update`).

use tracing::{debug, warn};

use crate::ids::PeerId;
use crate::media::MediaStreamHandle;
use crate::services::presence::PresenceStore;

/// Where an inbound stream ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// Bound to the peer's own record.
    Primary,
    /// Bound to the peer's `{peer}-screen` phantom.
    Screen,
    /// Known, unbound: the peer says it is not sharing.
    Parked,
    /// Claimed to come from ourselves; dropped.
    Ignored,
}

/// Attach `stream`, received from `peer`, to the right record.
pub fn classify(store: &mut PresenceStore, peer: &PeerId, stream: MediaStreamHandle) -> StreamRole {
    if *peer == *store.local_id() {
        warn!(%peer, stream = %stream.id, "classifier: inbound stream from local id dropped");
        return StreamRole::Ignored;
    }

    let role = if store.ensure_peer(peer) {
        // first sighting; name arrives later
        StreamRole::Primary
    } else {
        let hints = store.hints(peer);
        if hints.screen.as_ref() == Some(&stream.id) {
            StreamRole::Screen
        } else if hints.camera.as_ref() == Some(&stream.id) {
            StreamRole::Primary
        } else {
            match store.primary_stream_id(peer) {
                None => StreamRole::Primary,
                Some(bound) if *bound == stream.id => StreamRole::Primary,
                Some(_) if hints.known && hints.screen.is_none() => StreamRole::Parked,
                Some(_) => StreamRole::Screen,
            }
        }
    };

    debug!(%peer, stream = %stream.id, ?role, "classifier: stream bound");
    match role {
        StreamRole::Primary => store.bind_primary(peer, stream),
        StreamRole::Screen => store.bind_screen(peer, stream),
        StreamRole::Parked => store.park(peer, stream),
        StreamRole::Ignored => {}
    }
    role
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;
