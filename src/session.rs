//! Session controller: one participant's actor loop.
//!
//! ARCHITECTURE
//! ============
//! [`join`] acquires the camera, opens the transport, and spawns a single
//! task that owns every piece of engine state: presence store, whiteboard,
//! connection manager, churn debouncer. Nothing else mutates them. Inputs
//! arrive on channels and are handled one at a time:
//!
//! - user commands from the [`SessionHandle`]
//! - transport events (signals, presence, whiteboard, join/leave)
//! - connection events (inbound tracks, link state)
//! - debounce expiries
//! - screen capture results and out-of-band capture ends
//! - heartbeat and catch-up timers
//!
//! After every input the loop publishes a fresh [`RoomView`] on a `watch`
//! channel; that is the render-layer contract.
//!
//! Slow work never runs inline. Negotiation runs on per-peer workers,
//! screen acquisition on a spawned task that reports back, so peer B's
//! events keep flowing while peer A negotiates.
//!
//! LIFECYCLE
//! =========
//! 1. Camera + mic acquired (failure aborts the join)
//! 2. Transport opened with the initial presence (bounded by `join_timeout`)
//! 3. Loop runs until `Leave`, the handle is dropped, or the transport closes
//! 4. Shutdown: timers cleared, connections closed, local tracks stopped
//!
//! ERROR HANDLING
//! ==============
//! Only capture and transport errors are visible. A capture error during
//! `join` fails the join; later (screen share) it lands in
//! `RoomView::last_error`. A closed transport ends the session with
//! `SessionStatus::Failed`. Everything else is logged and swallowed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::ids::{DeskItemId, PeerId, RoomId, StreamId};
use crate::media::{Capture, CaptureError, MediaDevices, MediaStreamHandle, TrackKind};
use crate::peer::{ConnectionEvent, PeerConnector};
use crate::protocol::{Outbound, PresencePatch, PresenceUpdate, TransportEvent, next_ts};
use crate::services::classifier::classify;
use crate::services::connection::ConnectionManager;
use crate::services::debounce::{ChurnDebouncer, Expired};
use crate::services::presence::{PresenceStore, snapshot_patch};
use crate::services::speaking::SpeakingGate;
use crate::services::whiteboard::Whiteboard;
use crate::state::{DeskItemKind, PresenceRecord, WhiteboardAction, WhiteboardElement};
use crate::transport::{Outbox, Transport, TransportError};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("session has ended")]
    Ended,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

impl frames::ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Capture(e) => e.error_code(),
            Self::Transport(e) => e.error_code(),
            Self::Ended => "E_SESSION_ENDED",
            Self::Timeout(_) => "E_SESSION_TIMEOUT",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.retryable(),
            Self::Timeout(_) => true,
            Self::Capture(_) | Self::Ended => false,
        }
    }
}

// =============================================================================
// PUBLIC TYPES
// =============================================================================

/// Who the local participant says they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub display_name: String,
    pub avatar_ref: String,
}

impl Profile {
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), avatar_ref: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Live,
    Left,
    /// The signaling channel was lost. Rejoin to recover.
    Failed { reason: String },
}

/// Everything the render layer needs, republished after each input.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    pub local_id: PeerId,
    pub status: SessionStatus,
    /// Local record, local screen phantom, then remote records by id.
    pub records: Vec<PresenceRecord>,
    pub elements: Vec<WhiteboardElement>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub muted: bool,
    pub video_off: bool,
    pub sharing_screen: bool,
    /// Most recent user-visible capability error.
    pub last_error: Option<String>,
}

impl RoomView {
    #[must_use]
    pub fn record(&self, peer: &PeerId) -> Option<&PresenceRecord> {
        self.records.iter().find(|r| r.peer_id == *peer)
    }

    /// Remote records, phantoms included.
    pub fn remote(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.records.iter().filter(|r| !r.is_local && r.peer_id != self.local_id.screen())
    }
}

/// User actions.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleMic,
    ToggleCamera,
    StartScreenShare,
    StopScreenShare,
    /// One frame of microphone frequency magnitudes.
    AudioLevels(Vec<u8>),
    SetDisplayName(String),
    AddDeskItem { kind: DeskItemKind, payload: Value },
    MoveDeskItem { id: DeskItemId, x: f64, y: f64 },
    UpdateDeskItem { id: DeskItemId, payload: Value },
    RemoveDeskItem(DeskItemId),
    /// Committed whiteboard edit (undoable).
    Draw(WhiteboardAction),
    /// In-progress drag: broadcast, no undo entry.
    Preview(WhiteboardAction),
    Undo,
    Redo,
    ClearBoard,
    Leave,
}

/// Handle to a running session. Dropping it leaves the room.
pub struct SessionHandle {
    local_id: PeerId,
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<RoomView>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    #[must_use]
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Latest published view.
    #[must_use]
    pub fn view(&self) -> RoomView {
        self.view.borrow().clone()
    }

    /// A receiver that observes every republished view.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<RoomView> {
        self.view.clone()
    }

    /// Queue a user action.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Ended`] once the session loop has stopped.
    pub fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Ended)
    }

    /// Wait until the published view satisfies `pred`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Timeout`] after `limit`; [`SessionError::Ended`]
    /// when the loop stops first.
    pub async fn wait_until(
        &self,
        limit: Duration,
        pred: impl FnMut(&RoomView) -> bool,
    ) -> Result<RoomView, SessionError> {
        let mut rx = self.view.clone();
        match tokio::time::timeout(limit, rx.wait_for(pred)).await {
            Ok(Ok(view)) => Ok(view.clone()),
            Ok(Err(_)) => Err(SessionError::Ended),
            Err(_) => Err(SessionError::Timeout("room view")),
        }
    }

    /// Leave the room and wait for teardown to finish.
    pub async fn leave(self) {
        let _ = self.commands.send(Command::Leave);
        if let Err(e) = self.task.await {
            warn!(error = %e, "session: loop ended abnormally");
        }
    }
}

// =============================================================================
// JOIN
// =============================================================================

/// Acquire local media, join `room`, and start the session loop.
///
/// # Errors
///
/// Fails when the camera cannot be acquired or the transport cannot be
/// opened within `config.join_timeout`. Any acquired media is stopped.
pub async fn join(
    config: SessionConfig,
    profile: Profile,
    room: RoomId,
    transport: Box<dyn Transport>,
    devices: Arc<dyn MediaDevices>,
    connector: Arc<dyn PeerConnector>,
) -> Result<SessionHandle, SessionError> {
    let camera = devices.user_media().await.inspect_err(|e| warn!(error = %e, "session: camera unavailable"))?;

    let intro = PresenceRecord::local(PeerId::new(""), &profile.display_name, &profile.avatar_ref);
    let announce = PresenceUpdate {
        patch: snapshot_patch(&intro),
        camera_stream: Some(camera.stream.id.clone()),
        screen_stream: None,
        ts: next_ts(),
    };

    let link = match tokio::time::timeout(config.join_timeout, transport.open(&room, announce)).await {
        Ok(Ok(link)) => link,
        Ok(Err(e)) => {
            devices.stop(&camera.stream);
            error!(%room, error = %e, "session: join failed");
            return Err(e.into());
        }
        Err(_) => {
            devices.stop(&camera.stream);
            error!(%room, "session: join timed out");
            return Err(TransportError::Timeout("room:join").into());
        }
    };

    let local_id = link.local_id.clone();
    let mut store = PresenceStore::new(local_id.clone(), &profile.display_name, &profile.avatar_ref);
    store.set_local_stream(Some(camera.stream.clone()));
    // joiner answers; existing peers offer once they see us
    for peer in &link.existing {
        store.ensure_peer(peer);
    }

    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    let mut connections = ConnectionManager::new(connector, link.outbox.clone(), conn_tx);
    connections.add_local_stream(camera.stream);

    let (debounce, expired_rx) = ChurnDebouncer::new(config.departure_grace);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    let mut session = Session {
        config,
        store,
        board: Whiteboard::new(config.undo_limit),
        connections,
        debounce,
        speaking: SpeakingGate::new(),
        devices,
        outbox: link.outbox,
        internal: internal_tx,
        screen: None,
        screen_requests: 0,
        screen_pending: None,
        catchup: None,
        status: SessionStatus::Live,
        last_error: None,
    };
    let (view_tx, view_rx) = watch::channel(session.view());
    info!(%room, peer = %local_id, existing = link.existing.len(), "session: joined");

    let inputs = Inputs { commands: cmd_rx, transport: link.events, connections: conn_rx, expired: expired_rx, internal: internal_rx };
    let task = tokio::spawn(async move { session.run(inputs, view_tx).await });

    Ok(SessionHandle { local_id, commands: cmd_tx, view: view_rx, task })
}

// =============================================================================
// LOOP
// =============================================================================

/// Results of spawned work, posted back to the loop.
#[derive(Debug)]
enum Internal {
    /// Outcome of screen request `request`.
    ScreenCaptured { request: u64, result: Result<Capture, CaptureError> },
    ScreenEnded(StreamId),
}

struct Inputs {
    commands: mpsc::UnboundedReceiver<Command>,
    transport: mpsc::UnboundedReceiver<TransportEvent>,
    connections: mpsc::UnboundedReceiver<ConnectionEvent>,
    expired: mpsc::UnboundedReceiver<Expired>,
    internal: mpsc::UnboundedReceiver<Internal>,
}

/// What the loop does after handling one input.
enum Outcome {
    Continue,
    Leave,
    Failed(String),
}

struct Session {
    config: SessionConfig,
    store: PresenceStore,
    board: Whiteboard,
    connections: ConnectionManager,
    debounce: ChurnDebouncer,
    speaking: SpeakingGate,
    devices: Arc<dyn MediaDevices>,
    outbox: Outbox,
    internal: mpsc::UnboundedSender<Internal>,
    screen: Option<MediaStreamHandle>,
    /// Screen requests issued so far; each capture reports back its number.
    screen_requests: u64,
    /// The request whose capture will be installed. Cleared by a stop.
    screen_pending: Option<u64>,
    catchup: Option<Instant>,
    status: SessionStatus,
    last_error: Option<String>,
}

impl Session {
    async fn run(&mut self, mut inputs: Inputs, view: watch::Sender<RoomView>) {
        let mut heartbeat = self.config.heartbeat.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let outcome = tokio::select! {
                command = inputs.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => Outcome::Leave,
                },
                event = inputs.transport.recv() => match event {
                    Some(event) => self.handle_transport(event),
                    None => Outcome::Failed("signaling channel dropped".into()),
                },
                Some(event) = inputs.connections.recv() => self.handle_connection(event),
                Some(expired) = inputs.expired.recv() => self.handle_expired(&expired),
                Some(msg) = inputs.internal.recv() => self.handle_internal(msg),
                () = tick(heartbeat.as_mut()) => self.heartbeat(),
                () = sleep_until(self.catchup) => self.send_catchup(),
            };

            match outcome {
                Outcome::Continue => {
                    view.send_replace(self.view());
                }
                Outcome::Leave => {
                    self.release_pending(&mut inputs.internal);
                    self.shutdown(SessionStatus::Left).await;
                    view.send_replace(self.view());
                    break;
                }
                Outcome::Failed(reason) => {
                    error!(%reason, "session: transport lost");
                    self.release_pending(&mut inputs.internal);
                    self.shutdown(SessionStatus::Failed { reason }).await;
                    view.send_replace(self.view());
                    break;
                }
            }
        }
    }

    fn view(&self) -> RoomView {
        let local = self.store.local();
        RoomView {
            local_id: self.store.local_id().clone(),
            status: self.status.clone(),
            records: self.store.records(),
            elements: self.board.elements().to_vec(),
            can_undo: self.board.can_undo(),
            can_redo: self.board.can_redo(),
            muted: local.muted,
            video_off: local.video_off,
            sharing_screen: self.screen.is_some(),
            last_error: self.last_error.clone(),
        }
    }

    /// Close the internal channel and stop captures that raced the exit.
    /// Captures resolving later find the channel closed and stop themselves.
    fn release_pending(&mut self, internal: &mut mpsc::UnboundedReceiver<Internal>) {
        internal.close();
        self.screen_pending = None;
        while let Ok(msg) = internal.try_recv() {
            if let Internal::ScreenCaptured { result: Ok(capture), .. } = msg {
                debug!(stream = %capture.stream.id, "session: late screen capture released");
                self.devices.stop(&capture.stream);
            }
        }
    }

    async fn shutdown(&mut self, status: SessionStatus) {
        self.debounce.clear();
        self.connections.close_all().await;
        if let Some(screen) = self.screen.take() {
            self.devices.stop(&screen);
        }
        self.store.set_local_screen(None);
        if let Some(camera) = self.store.local().stream.clone() {
            self.devices.stop(&camera);
        }
        if status == SessionStatus::Left {
            self.outbox.send(Outbound::Leave);
        }
        info!(peer = %self.store.local_id(), ?status, "session: ended");
        self.status = status;
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    fn broadcast(&self, patch: PresencePatch) {
        self.outbox.send(Outbound::Presence(self.store.local_update(patch)));
    }

    fn draw(&self, action: WhiteboardAction) {
        self.outbox.send(Outbound::Whiteboard(action));
    }

    fn heartbeat(&self) -> Outcome {
        self.outbox.send(Outbound::Presence(self.store.local_snapshot()));
        Outcome::Continue
    }

    fn send_catchup(&mut self) -> Outcome {
        self.catchup = None;
        if self.board.is_empty() {
            debug!("session: catch-up skipped, board empty");
        } else {
            debug!(elements = self.board.elements().len(), "session: catch-up sync");
            self.draw(self.board.snapshot());
        }
        Outcome::Continue
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    fn handle_transport(&mut self, event: TransportEvent) -> Outcome {
        if event.peer().is_some_and(|p| p == self.store.local_id()) {
            debug!(?event, "session: event about ourselves ignored");
            return Outcome::Continue;
        }

        match event {
            TransportEvent::PeerJoined { peer, presence } => {
                self.debounce.observe(&peer);
                self.store.ensure_peer(&peer);
                if let Some(update) = presence {
                    self.store.apply_update(&peer, &update);
                }
                info!(%peer, "session: peer joined");
                // already here: we offer; then let the newcomer converge
                if let Err(e) = self.connections.initiate(&peer) {
                    debug!(%peer, error = %e, "session: no connection to offer on");
                }
                self.outbox.send(Outbound::Presence(self.store.local_snapshot()));
                self.catchup = Some(Instant::now() + self.config.catchup_delay);
            }
            TransportEvent::PeerLeft { peer } => {
                if self.store.get(&peer).is_some() || self.connections.contains(&peer) {
                    self.debounce.peer_left(&peer);
                } else {
                    debug!(%peer, "session: departure of unknown peer ignored");
                }
            }
            TransportEvent::Signal { from, signal } => {
                self.debounce.observe(&from);
                self.connections.handle_signal(&from, signal);
            }
            TransportEvent::Presence { from, update } => {
                self.debounce.observe(&from);
                self.store.apply_update(&from, &update);
            }
            TransportEvent::Whiteboard { from, action } => {
                self.debounce.observe(&from);
                let kind = action.kind();
                if !self.board.apply_remote(&action) {
                    debug!(peer = %from, kind, "session: whiteboard action had no effect");
                }
            }
            TransportEvent::Closed { reason } => return Outcome::Failed(reason),
        }
        Outcome::Continue
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    fn handle_connection(&mut self, event: ConnectionEvent) -> Outcome {
        match event {
            ConnectionEvent::TrackReceived { peer, stream } => {
                self.debounce.observe(&peer);
                classify(&mut self.store, &peer, stream);
            }
            ConnectionEvent::TrackRemoved { peer, stream_id } => {
                self.debounce.observe(&peer);
                if self.store.unbind(&peer, &stream_id) {
                    debug!(%peer, stream = %stream_id, "session: stream retired");
                }
            }
            ConnectionEvent::StateChanged { peer, state } => {
                debug!(%peer, ?state, "session: link state");
                self.store.set_link_state(&peer, state);
            }
        }
        Outcome::Continue
    }

    fn handle_expired(&mut self, expired: &Expired) -> Outcome {
        if self.debounce.confirm(expired) {
            let peer = &expired.peer;
            self.store.remove_peer(peer);
            self.connections.remove(peer);
            info!(%peer, "session: peer departed");
        }
        Outcome::Continue
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    fn handle_command(&mut self, command: Command) -> Outcome {
        match command {
            Command::ToggleMic => {
                let muted = !self.store.local().muted;
                self.set_track(TrackKind::Audio, !muted);
                if muted {
                    self.speaking.reset();
                }
                let patch = self.store.set_muted(muted);
                self.broadcast(patch);
            }
            Command::ToggleCamera => {
                let video_off = !self.store.local().video_off;
                self.set_track(TrackKind::Video, !video_off);
                let patch = self.store.set_video_off(video_off);
                self.broadcast(patch);
            }
            Command::StartScreenShare => self.start_screen_share(),
            Command::StopScreenShare => self.stop_screen_share(),
            Command::AudioLevels(levels) => {
                if let Some(speaking) = self.speaking.sample(&levels, self.store.local().muted) {
                    let patch = self.store.set_speaking(speaking);
                    self.broadcast(patch);
                }
            }
            Command::SetDisplayName(name) => {
                let patch = self.store.set_display_name(&name);
                self.broadcast(patch);
            }
            Command::AddDeskItem { kind, payload } => {
                let (id, patch) = self.store.add_desk_item(kind, payload);
                debug!(item = %id, ?kind, "session: desk item placed");
                self.broadcast(patch);
            }
            Command::MoveDeskItem { id, x, y } => {
                let patch = self.store.move_desk_item(&id, x, y);
                self.desk_patch(&id, patch);
            }
            Command::UpdateDeskItem { id, payload } => {
                let patch = self.store.update_desk_item(&id, payload);
                self.desk_patch(&id, patch);
            }
            Command::RemoveDeskItem(id) => {
                let patch = self.store.remove_desk_item(&id);
                self.desk_patch(&id, patch);
            }
            Command::Draw(action) => {
                let action = self.board.apply_local(action);
                self.draw(action);
            }
            Command::Preview(action) => {
                let action = self.board.preview(action);
                self.draw(action);
            }
            Command::Undo => match self.board.undo() {
                Some(sync) => self.draw(sync),
                None => debug!("session: nothing to undo"),
            },
            Command::Redo => match self.board.redo() {
                Some(sync) => self.draw(sync),
                None => debug!("session: nothing to redo"),
            },
            Command::ClearBoard => {
                let action = self.board.clear();
                self.draw(action);
            }
            Command::Leave => return Outcome::Leave,
        }
        Outcome::Continue
    }

    fn desk_patch(&self, id: &DeskItemId, patch: Option<PresencePatch>) {
        match patch {
            Some(patch) => self.broadcast(patch),
            None => debug!(item = %id, "session: no such desk item"),
        }
    }

    /// Flip a local camera track. Connections created from now on carry the
    /// new flag; live links keep what they negotiated, and peers learn the
    /// change from the presence broadcast.
    fn set_track(&mut self, kind: TrackKind, enabled: bool) {
        let Some(stream) = self.store.local_stream_mut() else {
            return;
        };
        if stream.set_enabled(kind, enabled).is_none() {
            debug!(?kind, "session: camera stream has no such track");
        }
        let stream = stream.clone();
        self.connections.update_local_stream(&stream);
    }

    // =========================================================================
    // SCREEN SHARE
    // =========================================================================

    fn start_screen_share(&mut self) {
        if self.screen.is_some() || self.screen_pending.is_some() {
            debug!("session: screen share already active");
            return;
        }
        self.screen_requests += 1;
        let request = self.screen_requests;
        self.screen_pending = Some(request);
        let devices = Arc::clone(&self.devices);
        let internal = self.internal.clone();
        tokio::spawn(async move {
            let result = devices.display_media().await;
            if let Err(SendError(Internal::ScreenCaptured { result: Ok(capture), .. })) =
                internal.send(Internal::ScreenCaptured { request, result })
            {
                debug!(stream = %capture.stream.id, "session: gone before screen capture resolved");
                devices.stop(&capture.stream);
            }
        });
    }

    fn handle_internal(&mut self, msg: Internal) -> Outcome {
        match msg {
            Internal::ScreenCaptured { request, result } if self.screen_pending != Some(request) => {
                if let Ok(capture) = result {
                    info!(stream = %capture.stream.id, "session: screen capture arrived after stop, released");
                    self.devices.stop(&capture.stream);
                }
            }
            Internal::ScreenCaptured { result: Ok(capture), .. } => self.screen_captured(capture),
            Internal::ScreenCaptured { result: Err(e), .. } => {
                self.screen_pending = None;
                warn!(error = %e, "session: screen capture failed");
                self.last_error = Some(e.to_string());
            }
            Internal::ScreenEnded(id) => {
                if self.screen.as_ref().is_some_and(|s| s.id == id) {
                    info!(stream = %id, "session: screen share ended out-of-band");
                    self.stop_screen_share();
                }
            }
        }
        Outcome::Continue
    }

    fn screen_captured(&mut self, capture: Capture) {
        self.screen_pending = None;
        let stream = capture.stream;
        if let Some(ended) = capture.ended {
            let internal = self.internal.clone();
            let id = stream.id.clone();
            tokio::spawn(async move {
                if ended.await.is_ok() {
                    let _ = internal.send(Internal::ScreenEnded(id));
                }
            });
        }
        info!(stream = %stream.id, peers = self.connections.peers().len(), "session: screen share started");
        self.store.set_local_screen(Some(stream.clone()));
        self.connections.add_local_stream(stream.clone());
        self.screen = Some(stream);
        self.last_error = None;
        self.broadcast(PresencePatch::default());
    }

    /// Same cleanup for an explicit stop and an out-of-band end.
    fn stop_screen_share(&mut self) {
        if let Some(request) = self.screen_pending.take() {
            info!(request, "session: pending screen capture cancelled");
            return;
        }
        let Some(stream) = self.screen.take() else {
            debug!("session: no screen share to stop");
            return;
        };
        self.devices.stop(&stream);
        self.store.set_local_screen(None);
        self.connections.remove_local_stream(&stream.id);
        self.broadcast(PresencePatch::default());
        info!(stream = %stream.id, "session: screen share stopped");
    }
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
