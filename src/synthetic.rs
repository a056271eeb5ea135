//! Synthetic media: capture devices and peer connections with no codecs.
//!
//! DESIGN
//! ======
//! `SyntheticDevices` hands out stream descriptions with fresh ids and lets
//! a test (or the cli) end a screen capture out-of-band, the way an OS
//! "stop sharing" button would.
//!
//! `SyntheticConnector` builds connections whose session description is
//! simply the JSON list of offered streams. Applying a remote description
//! diffs it against the previous one and raises `track` / `track_removed`
//! events, so renegotiation behaves like the real thing: the answerer sees
//! the offerer's streams, the offerer sees the answerer's. Everything the
//! description carries is serializable, so two processes talking over the
//! relay negotiate just as well as two sessions in one test.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ids::{PeerId, StreamId};
use crate::media::{Capture, CaptureError, MediaDevices, MediaStreamHandle, MediaTrack, TrackKind};
use crate::peer::{ConnectionEvents, LinkState, NegotiationError, PeerConnection, PeerConnector};

// =============================================================================
// DEVICES
// =============================================================================

#[derive(Default)]
pub struct SyntheticDevices {
    deny_camera: AtomicBool,
    deny_screen: AtomicBool,
    /// Milliseconds the screen "permission prompt" stays open.
    screen_delay_ms: AtomicU64,
    screens: Mutex<HashMap<StreamId, oneshot::Sender<()>>>,
    stopped: Mutex<Vec<StreamId>>,
}

impl SyntheticDevices {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make camera acquisition fail with `PermissionDenied`.
    #[must_use]
    pub fn deny_camera(self) -> Self {
        self.deny_camera.store(true, Ordering::Relaxed);
        self
    }

    /// Toggle screen capture permission.
    pub fn set_deny_screen(&self, deny: bool) {
        self.deny_screen.store(deny, Ordering::Relaxed);
    }

    /// Hold every screen capture for `delay` before it resolves.
    pub fn set_screen_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.screen_delay_ms.store(ms, Ordering::Relaxed);
    }

    /// End screen capture `id` as if the OS stopped it. Returns false when
    /// no such capture is live.
    pub fn end_screen(&self, id: &StreamId) -> bool {
        let Ok(mut screens) = self.screens.lock() else {
            return false;
        };
        screens.remove(id).is_some_and(|tx| tx.send(()).is_ok())
    }

    /// Ids passed to `stop`, in call order.
    #[must_use]
    pub fn stopped(&self) -> Vec<StreamId> {
        self.stopped.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn user_media(&self) -> Result<Capture, CaptureError> {
        if self.deny_camera.load(Ordering::Relaxed) {
            return Err(CaptureError::PermissionDenied);
        }
        let stream = synthetic_stream("cam", &[TrackKind::Audio, TrackKind::Video]);
        Ok(Capture { stream, ended: None })
    }

    async fn display_media(&self) -> Result<Capture, CaptureError> {
        let delay = self.screen_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.deny_screen.load(Ordering::Relaxed) {
            return Err(CaptureError::PermissionDenied);
        }
        let stream = synthetic_stream("screen", &[TrackKind::Video]);
        let (tx, rx) = oneshot::channel();
        if let Ok(mut screens) = self.screens.lock() {
            screens.insert(stream.id.clone(), tx);
        }
        Ok(Capture { stream, ended: Some(rx) })
    }

    fn stop(&self, stream: &MediaStreamHandle) {
        if let Ok(mut screens) = self.screens.lock() {
            screens.remove(&stream.id);
        }
        if let Ok(mut stopped) = self.stopped.lock() {
            stopped.push(stream.id.clone());
        }
        debug!(stream = %stream.id, "synthetic: capture stopped");
    }
}

fn synthetic_stream(label: &str, kinds: &[TrackKind]) -> MediaStreamHandle {
    let id = format!("{label}-{}", Uuid::new_v4().simple());
    let tracks = kinds
        .iter()
        .enumerate()
        .map(|(i, &kind)| MediaTrack { id: format!("{id}/{i}"), kind, enabled: true })
        .collect();
    MediaStreamHandle::new(StreamId::new(id), tracks)
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Connector for [`SyntheticConnection`]s. Peers in the failure set get
/// connections whose every negotiation step fails.
#[derive(Default)]
pub struct SyntheticConnector {
    unreachable: Mutex<HashSet<PeerId>>,
}

impl SyntheticConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections created to `peer` from now on fail ICE.
    pub fn fail_peer(&self, peer: &PeerId) {
        if let Ok(mut set) = self.unreachable.lock() {
            set.insert(peer.clone());
        }
    }
}

impl PeerConnector for SyntheticConnector {
    fn connect(&self, peer: &PeerId, events: ConnectionEvents) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        let unreachable = self.unreachable.lock().is_ok_and(|set| set.contains(peer));
        Ok(Arc::new(SyntheticConnection { events, unreachable, inner: Mutex::new(Inner::default()) }))
    }
}

#[derive(Default)]
struct Inner {
    outgoing: Vec<MediaStreamHandle>,
    incoming: Vec<StreamId>,
    connected: bool,
    closed: bool,
}

pub struct SyntheticConnection {
    events: ConnectionEvents,
    unreachable: bool,
    inner: Mutex<Inner>,
}

impl SyntheticConnection {
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, NegotiationError> {
        let inner = self.inner.lock().map_err(|_| NegotiationError::Closed)?;
        if inner.closed {
            return Err(NegotiationError::Closed);
        }
        if self.unreachable {
            return Err(NegotiationError::Ice(format!("no route to {}", self.events.peer())));
        }
        Ok(inner)
    }

    fn describe(inner: &Inner) -> Result<String, NegotiationError> {
        serde_json::to_string(&inner.outgoing).map_err(|e| NegotiationError::Sdp(e.to_string()))
    }

    /// Apply the remote stream list: announce new streams, retire missing ones.
    fn apply_remote(&self, inner: &mut Inner, sdp: &str) -> Result<(), NegotiationError> {
        let streams: Vec<MediaStreamHandle> =
            serde_json::from_str(sdp).map_err(|e| NegotiationError::Sdp(e.to_string()))?;

        let offered: Vec<StreamId> = streams.iter().map(|s| s.id.clone()).collect();
        for gone in inner.incoming.iter().filter(|id| !offered.contains(id)) {
            self.events.track_removed(gone.clone());
        }
        for stream in streams {
            if !inner.incoming.contains(&stream.id) {
                self.events.track(stream);
            }
        }
        inner.incoming = offered;

        if !inner.connected {
            inner.connected = true;
            self.events.state(LinkState::Connected);
        }
        Ok(())
    }
}

#[async_trait]
impl PeerConnection for SyntheticConnection {
    async fn offer(&self) -> Result<String, NegotiationError> {
        let inner = self.lock()?;
        let sdp = Self::describe(&inner)?;
        drop(inner);
        self.events.ice_candidate(json!({ "candidate": "synthetic host", "sdpMid": "0" }));
        Ok(sdp)
    }

    async fn accept_offer(&self, sdp: &str) -> Result<String, NegotiationError> {
        let mut inner = self.lock()?;
        self.apply_remote(&mut inner, sdp)?;
        Self::describe(&inner)
    }

    async fn accept_answer(&self, sdp: &str) -> Result<(), NegotiationError> {
        let mut inner = self.lock()?;
        self.apply_remote(&mut inner, sdp)
    }

    async fn add_ice_candidate(&self, candidate: &Value) -> Result<(), NegotiationError> {
        let _inner = self.lock()?;
        if candidate.get("candidate").and_then(Value::as_str).is_none() {
            return Err(NegotiationError::Ice("candidate without address".into()));
        }
        Ok(())
    }

    fn add_stream(&self, stream: &MediaStreamHandle) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.outgoing.retain(|s| s.id != stream.id);
        inner.outgoing.push(stream.clone());
    }

    fn remove_stream(&self, stream_id: &StreamId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.outgoing.retain(|s| s.id != *stream_id);
        }
    }

    async fn close(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!(peer = %self.events.peer(), "synthetic: connection lock poisoned on close");
            return;
        };
        if !inner.closed {
            inner.closed = true;
            drop(inner);
            self.events.state(LinkState::Closed);
        }
    }
}

#[cfg(test)]
#[path = "synthetic_test.rs"]
mod tests;
