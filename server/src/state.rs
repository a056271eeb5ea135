//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds one entry per live room: the connected peers and the sender for
//! each peer's outgoing frames. The relay keeps no room content; a room
//! disappears with its last peer.

use std::collections::HashMap;
use std::sync::Arc;

use frames::Frame;
use tokio::sync::{RwLock, mpsc};

use crate::config::RelayConfig;

// =============================================================================
// ROOM STATE
// =============================================================================

/// Per-room membership: `peer_id` -> sender for outgoing frames.
#[derive(Default)]
pub struct RoomState {
    pub peers: HashMap<String, mpsc::Sender<Frame>>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, RoomState>>>,
    pub config: RelayConfig,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), config }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
