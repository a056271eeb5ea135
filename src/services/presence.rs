//! Presence store: the single source of truth the render layer reads.
//!
//! DESIGN
//! ======
//! Holds the local record, the local screen phantom, and every remote
//! record (primaries and `{peer}-screen` phantoms) keyed by peer id.
//! Side data per remote peer lives in `PeerMeta`: a last-write-wins clock
//! per field, the latest stream hints, and streams that are known but not
//! currently bound to any record ("parked").
//!
//! MERGE RULES
//! ===========
//! - Each field of a partial update wins if its timestamp is not older than
//!   the one that last wrote that field. Equal timestamps apply, so
//!   re-delivery is idempotent.
//! - The screen phantom exists exactly when the latest hints carry a screen
//!   stream. Removing it parks its stream rather than dropping it.
//! - After every update, streams are re-bound from the hints. A bound
//!   stream is never discarded by a presence update; at worst it is parked
//!   until a hint claims it or the track is removed.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::ids::{DeskItemId, PeerId, StreamId};
use crate::media::MediaStreamHandle;
use crate::peer::LinkState;
use crate::protocol::{PresencePatch, PresenceUpdate, next_ts};
use crate::state::{DeskItem, DeskItemKind, PresenceRecord, screen_name};

// =============================================================================
// TYPES
// =============================================================================

/// Latest stream hints received from a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHints {
    pub camera: Option<StreamId>,
    pub screen: Option<StreamId>,
    /// False until the peer's first presence update arrives.
    pub known: bool,
}

#[derive(Debug, Default)]
struct FieldClocks {
    display_name: i64,
    avatar_ref: i64,
    muted: i64,
    video_off: i64,
    speaking: i64,
    decorations: i64,
    hints: i64,
}

#[derive(Debug, Default)]
struct PeerMeta {
    clocks: FieldClocks,
    hints: StreamHints,
    parked: Vec<MediaStreamHandle>,
}

pub struct PresenceStore {
    local: PresenceRecord,
    local_screen: Option<PresenceRecord>,
    remote: BTreeMap<PeerId, PresenceRecord>,
    meta: HashMap<PeerId, PeerMeta>,
}

impl PresenceStore {
    #[must_use]
    pub fn new(local_id: PeerId, display_name: &str, avatar_ref: &str) -> Self {
        Self {
            local: PresenceRecord::local(local_id, display_name, avatar_ref),
            local_screen: None,
            remote: BTreeMap::new(),
            meta: HashMap::new(),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn local_id(&self) -> &PeerId {
        &self.local.peer_id
    }

    #[must_use]
    pub fn local(&self) -> &PresenceRecord {
        &self.local
    }

    #[must_use]
    pub fn local_screen(&self) -> Option<&PresenceRecord> {
        self.local_screen.as_ref()
    }

    #[must_use]
    pub fn get(&self, id: &PeerId) -> Option<&PresenceRecord> {
        if *id == self.local.peer_id {
            return Some(&self.local);
        }
        if let Some(screen) = self.local_screen.as_ref().filter(|s| s.peer_id == *id) {
            return Some(screen);
        }
        self.remote.get(id)
    }

    /// Every record in render order: local, local screen, then remote by id.
    #[must_use]
    pub fn records(&self) -> Vec<PresenceRecord> {
        let mut out = Vec::with_capacity(self.remote.len() + 2);
        out.push(self.local.clone());
        out.extend(self.local_screen.clone());
        out.extend(self.remote.values().cloned());
        out
    }

    /// Remote physical peers (phantoms excluded).
    #[must_use]
    pub fn remote_peers(&self) -> Vec<PeerId> {
        self.remote.values().filter(|r| !r.is_screen_share).map(|r| r.peer_id.clone()).collect()
    }

    #[must_use]
    pub fn hints(&self, peer: &PeerId) -> StreamHints {
        self.meta.get(peer).map(|m| m.hints.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn primary_stream_id(&self, peer: &PeerId) -> Option<&StreamId> {
        self.remote.get(peer)?.stream.as_ref().map(|s| &s.id)
    }

    /// Streams of `peer` known but bound to no record.
    #[must_use]
    pub fn parked(&self, peer: &PeerId) -> &[MediaStreamHandle] {
        self.meta.get(peer).map_or(&[], |m| m.parked.as_slice())
    }

    fn is_local_id(&self, peer: &PeerId) -> bool {
        *peer == self.local.peer_id || *peer == self.local.peer_id.screen()
    }

    // =========================================================================
    // REMOTE MERGE
    // =========================================================================

    /// Create a placeholder record for `peer` if none exists.
    /// Returns whether one was created.
    pub fn ensure_peer(&mut self, peer: &PeerId) -> bool {
        if self.is_local_id(peer) || self.remote.contains_key(peer) {
            return false;
        }
        self.remote.insert(peer.clone(), PresenceRecord::placeholder(peer.clone()));
        self.meta.entry(peer.clone()).or_default();
        true
    }

    /// Merge a partial update from `peer`.
    pub fn apply_update(&mut self, peer: &PeerId, update: &PresenceUpdate) {
        if self.is_local_id(peer) {
            debug!(%peer, "presence: update claiming the local id ignored");
            return;
        }
        let meta = self.meta.entry(peer.clone()).or_default();
        let record = self.remote.entry(peer.clone()).or_insert_with(|| PresenceRecord::placeholder(peer.clone()));

        let ts = update.ts;
        let patch = &update.patch;
        let clocks = &mut meta.clocks;
        merge(&mut record.display_name, &mut clocks.display_name, patch.display_name.as_ref(), ts);
        merge(&mut record.avatar_ref, &mut clocks.avatar_ref, patch.avatar_ref.as_ref(), ts);
        merge(&mut record.muted, &mut clocks.muted, patch.muted.as_ref(), ts);
        merge(&mut record.video_off, &mut clocks.video_off, patch.video_off.as_ref(), ts);
        merge(&mut record.speaking, &mut clocks.speaking, patch.speaking.as_ref(), ts);
        merge(&mut record.decorations, &mut clocks.decorations, patch.decorations.as_ref(), ts);
        if ts >= clocks.hints {
            clocks.hints = ts;
            meta.hints = StreamHints {
                camera: update.camera_stream.clone(),
                screen: update.screen_stream.clone(),
                known: true,
            };
        }
        record.last_update_ts = record.last_update_ts.max(ts);

        let has_hint = meta.hints.screen.is_some();
        self.derive_screen_record(peer, has_hint);
        self.rebind(peer);
    }

    /// Create, refresh, or remove `peer`'s screen phantom so that it exists
    /// exactly when `has_hint` is true. Idempotent.
    pub fn derive_screen_record(&mut self, peer: &PeerId, has_hint: bool) {
        let screen_id = peer.screen();
        if !has_hint {
            if let Some(phantom) = self.remote.remove(&screen_id) {
                debug!(%peer, "presence: screen share ended");
                if let Some(stream) = phantom.stream {
                    self.meta.entry(peer.clone()).or_default().parked.push(stream);
                }
            }
            return;
        }
        let Some(owner) = self.remote.get(peer) else {
            return;
        };
        let template = PresenceRecord::screen_of(owner);
        let phantom = self.remote.entry(screen_id).or_insert_with(|| template.clone());
        phantom.display_name = template.display_name;
        phantom.link = template.link;
        phantom.last_update_ts = template.last_update_ts;
    }

    /// Re-assign `peer`'s known streams from its hints, falling back to the
    /// previous binding for streams no hint claims.
    fn rebind(&mut self, peer: &PeerId) {
        let Some(meta) = self.meta.get_mut(peer) else {
            return;
        };
        let screen_id = peer.screen();
        let has_phantom = self.remote.contains_key(&screen_id);

        let prev_primary = self.remote.get_mut(peer).and_then(|r| r.stream.take());
        let prev_screen = self.remote.get_mut(&screen_id).and_then(|r| r.stream.take());
        let prev_primary_id = prev_primary.as_ref().map(|s| s.id.clone());
        let prev_screen_id = prev_screen.as_ref().map(|s| s.id.clone());

        let mut pool: Vec<MediaStreamHandle> = prev_primary.into_iter().chain(prev_screen).collect();
        pool.append(&mut meta.parked);

        let mut primary = take_stream(&mut pool, meta.hints.camera.as_ref());
        let mut screen = if has_phantom { take_stream(&mut pool, meta.hints.screen.as_ref()) } else { None };
        if primary.is_none() {
            primary = take_stream(&mut pool, prev_primary_id.as_ref());
        }
        if has_phantom && screen.is_none() {
            screen = take_stream(&mut pool, prev_screen_id.as_ref());
        }

        meta.parked = pool;
        if let Some(record) = self.remote.get_mut(peer) {
            record.stream = primary;
        }
        if let Some(record) = self.remote.get_mut(&screen_id) {
            record.stream = screen;
        }
    }

    // =========================================================================
    // STREAM BINDING
    // =========================================================================

    /// Bind `stream` as `peer`'s primary feed. A different stream already
    /// bound there is parked.
    pub fn bind_primary(&mut self, peer: &PeerId, stream: MediaStreamHandle) {
        self.detach(peer, &stream.id);
        let Some(record) = self.remote.get_mut(peer) else {
            return;
        };
        let old = record.stream.replace(stream);
        self.park_opt(peer, old);
    }

    /// Bind `stream` to `peer`'s screen phantom, creating the phantom if
    /// hints have not announced it yet.
    pub fn bind_screen(&mut self, peer: &PeerId, stream: MediaStreamHandle) {
        self.detach(peer, &stream.id);
        let Some(owner) = self.remote.get(peer) else {
            return;
        };
        let template = PresenceRecord::screen_of(owner);
        let phantom = self.remote.entry(peer.screen()).or_insert(template);
        let old = phantom.stream.replace(stream);
        self.park_opt(peer, old);
    }

    /// Remember `stream` without binding it.
    pub fn park(&mut self, peer: &PeerId, stream: MediaStreamHandle) {
        self.detach(peer, &stream.id);
        self.meta.entry(peer.clone()).or_default().parked.push(stream);
    }

    /// Forget stream `id` wherever it is bound for `peer`.
    /// Returns whether it was known.
    pub fn unbind(&mut self, peer: &PeerId, id: &StreamId) -> bool {
        self.detach(peer, id)
    }

    fn park_opt(&mut self, peer: &PeerId, stream: Option<MediaStreamHandle>) {
        if let Some(stream) = stream {
            self.meta.entry(peer.clone()).or_default().parked.push(stream);
        }
    }

    fn detach(&mut self, peer: &PeerId, id: &StreamId) -> bool {
        let mut found = false;
        for key in [peer.clone(), peer.screen()] {
            if let Some(record) = self.remote.get_mut(&key) {
                if record.stream.as_ref().is_some_and(|s| s.id == *id) {
                    record.stream = None;
                    found = true;
                }
            }
        }
        if let Some(meta) = self.meta.get_mut(peer) {
            let before = meta.parked.len();
            meta.parked.retain(|s| s.id != *id);
            found |= meta.parked.len() != before;
        }
        found
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Drop `peer`, its phantom, and everything known about it.
    pub fn remove_peer(&mut self, peer: &PeerId) -> bool {
        self.meta.remove(peer);
        self.remote.remove(&peer.screen());
        self.remote.remove(peer).is_some()
    }

    pub fn set_link_state(&mut self, peer: &PeerId, state: LinkState) {
        for key in [peer.clone(), peer.screen()] {
            if let Some(record) = self.remote.get_mut(&key) {
                record.link = state;
            }
        }
    }

    // =========================================================================
    // LOCAL MUTATIONS
    // =========================================================================

    pub fn set_local_stream(&mut self, stream: Option<MediaStreamHandle>) {
        self.local.stream = stream;
    }

    pub fn local_stream_mut(&mut self) -> Option<&mut MediaStreamHandle> {
        self.local.stream.as_mut()
    }

    /// Install or remove the local screen phantom.
    pub fn set_local_screen(&mut self, stream: Option<MediaStreamHandle>) {
        self.local_screen = stream.map(|stream| PresenceRecord { stream: Some(stream), ..PresenceRecord::screen_of(&self.local) });
        self.touch_local();
    }

    pub fn set_display_name(&mut self, name: &str) -> PresencePatch {
        name.clone_into(&mut self.local.display_name);
        if let Some(screen) = &mut self.local_screen {
            screen.display_name = screen_name(name);
        }
        self.touch_local();
        PresencePatch { display_name: Some(name.to_owned()), ..PresencePatch::default() }
    }

    pub fn set_muted(&mut self, muted: bool) -> PresencePatch {
        self.local.muted = muted;
        let mut patch = PresencePatch { muted: Some(muted), ..PresencePatch::default() };
        if muted && self.local.speaking {
            self.local.speaking = false;
            patch.speaking = Some(false);
        }
        self.touch_local();
        patch
    }

    pub fn set_video_off(&mut self, video_off: bool) -> PresencePatch {
        self.local.video_off = video_off;
        self.touch_local();
        PresencePatch { video_off: Some(video_off), ..PresencePatch::default() }
    }

    pub fn set_speaking(&mut self, speaking: bool) -> PresencePatch {
        self.local.speaking = speaking;
        self.touch_local();
        PresencePatch { speaking: Some(speaking), ..PresencePatch::default() }
    }

    /// Place a new desk item. Returns its id and the patch to broadcast.
    pub fn add_desk_item(&mut self, kind: DeskItemKind, payload: serde_json::Value) -> (DeskItemId, PresencePatch) {
        let item = DeskItem::placed(kind, payload);
        let id = item.id.clone();
        self.local.decorations.push(item);
        (id, self.decorations_patch())
    }

    /// Move a desk item to `(x, y)`, clamped to the room.
    pub fn move_desk_item(&mut self, id: &DeskItemId, x: f64, y: f64) -> Option<PresencePatch> {
        let item = self.local.decorations.iter_mut().find(|i| i.id == *id)?;
        item.x = x.clamp(0.0, 100.0);
        item.y = y.clamp(0.0, 100.0);
        Some(self.decorations_patch())
    }

    pub fn update_desk_item(&mut self, id: &DeskItemId, payload: serde_json::Value) -> Option<PresencePatch> {
        let item = self.local.decorations.iter_mut().find(|i| i.id == *id)?;
        item.payload = payload;
        Some(self.decorations_patch())
    }

    pub fn remove_desk_item(&mut self, id: &DeskItemId) -> Option<PresencePatch> {
        let before = self.local.decorations.len();
        self.local.decorations.retain(|i| i.id != *id);
        (self.local.decorations.len() != before).then(|| self.decorations_patch())
    }

    fn decorations_patch(&mut self) -> PresencePatch {
        self.touch_local();
        PresencePatch { decorations: Some(self.local.decorations.clone()), ..PresencePatch::default() }
    }

    fn touch_local(&mut self) {
        self.local.last_update_ts = next_ts();
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Wrap `patch` with the current stream hints for broadcast.
    #[must_use]
    pub fn local_update(&self, patch: PresencePatch) -> PresenceUpdate {
        PresenceUpdate {
            patch,
            camera_stream: self.local.stream.as_ref().map(|s| s.id.clone()),
            screen_stream: self.local_screen.as_ref().and_then(|r| r.stream.as_ref()).map(|s| s.id.clone()),
            ts: next_ts(),
        }
    }

    /// The whole local record as an update (join, heartbeat).
    #[must_use]
    pub fn local_snapshot(&self) -> PresenceUpdate {
        self.local_update(snapshot_patch(&self.local))
    }
}

/// Full patch describing `record`.
#[must_use]
pub fn snapshot_patch(record: &PresenceRecord) -> PresencePatch {
    PresencePatch {
        display_name: Some(record.display_name.clone()),
        avatar_ref: Some(record.avatar_ref.clone()),
        muted: Some(record.muted),
        video_off: Some(record.video_off),
        speaking: Some(record.speaking),
        decorations: Some(record.decorations.clone()),
    }
}

fn merge<T: Clone>(slot: &mut T, clock: &mut i64, value: Option<&T>, ts: i64) {
    let Some(value) = value else {
        return;
    };
    if ts >= *clock {
        slot.clone_from(value);
        *clock = ts;
    }
}

fn take_stream(pool: &mut Vec<MediaStreamHandle>, id: Option<&StreamId>) -> Option<MediaStreamHandle> {
    let id = id?;
    let pos = pool.iter().position(|s| s.id == *id)?;
    Some(pool.remove(pos))
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
