use super::*;
use serde_json::json;

fn store() -> PresenceStore {
    PresenceStore::new(PeerId::new("me"), "Mika", "avatar://mika")
}

fn stream(id: &str) -> MediaStreamHandle {
    MediaStreamHandle::new(StreamId::new(id), Vec::new())
}

fn update(ts: i64, patch: PresencePatch, camera: Option<&str>, screen: Option<&str>) -> PresenceUpdate {
    PresenceUpdate { patch, camera_stream: camera.map(StreamId::new), screen_stream: screen.map(StreamId::new), ts }
}

fn named(name: &str) -> PresencePatch {
    PresencePatch { display_name: Some(name.into()), ..PresencePatch::default() }
}

fn item_id(store: &PresenceStore, peer: &PeerId) -> DeskItemId {
    store.get(peer).expect("record").decorations[0].id.clone()
}

fn bound(store: &PresenceStore, id: &str) -> Option<String> {
    store.get(&PeerId::new(id))?.stream.as_ref().map(|s| s.id.to_string())
}

// =============================================================================
// MERGE
// =============================================================================

#[test]
fn applying_the_same_update_twice_is_idempotent() {
    let peer = PeerId::new("p1");
    let u = update(10, PresencePatch { muted: Some(true), ..named("Luna") }, Some("cam"), Some("scr"));

    let mut once = store();
    once.apply_update(&peer, &u);
    let mut twice = store();
    twice.apply_update(&peer, &u);
    twice.apply_update(&peer, &u);

    assert_eq!(once.records(), twice.records());
    assert_eq!(twice.records().len(), 3);
}

#[test]
fn last_write_wins_per_field() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.apply_update(&peer, &update(10, PresencePatch { muted: Some(true), ..PresencePatch::default() }, None, None));
    // older timestamp: muted loses, but display_name was never written and applies
    s.apply_update(&peer, &update(5, PresencePatch { muted: Some(false), ..named("Luna") }, None, None));

    let rec = s.get(&peer).expect("record");
    assert!(rec.muted);
    assert_eq!(rec.display_name, "Luna");
    assert_eq!(rec.last_update_ts, 10);
}

#[test]
fn absent_fields_are_left_alone() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.apply_update(&peer, &update(1, PresencePatch { video_off: Some(true), ..named("Luna") }, None, None));
    s.apply_update(&peer, &update(2, PresencePatch { speaking: Some(true), ..PresencePatch::default() }, None, None));

    let rec = s.get(&peer).expect("record");
    assert!(rec.video_off);
    assert!(rec.speaking);
    assert_eq!(rec.display_name, "Luna");
}

#[test]
fn remote_updates_never_create_or_touch_local_records() {
    let mut s = store();
    s.apply_update(&PeerId::new("me"), &update(99, named("Impostor"), None, Some("x")));
    s.apply_update(&PeerId::new("me-screen"), &update(99, named("Impostor"), None, None));

    assert_eq!(s.local().display_name, "Mika");
    assert_eq!(s.records().iter().filter(|r| r.is_local).count(), 1);
    assert_eq!(s.records().len(), 1);
    assert!(!s.ensure_peer(&PeerId::new("me")));
}

#[test]
fn update_preserves_an_already_bound_stream() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.ensure_peer(&peer);
    s.bind_primary(&peer, stream("cam"));

    s.apply_update(&peer, &update(3, named("Luna"), None, None));
    assert_eq!(bound(&s, "p1").as_deref(), Some("cam"));
    assert_eq!(s.get(&peer).map(|r| r.display_name.as_str()), Some("Luna"));
}

#[test]
fn remote_desk_items_are_replicated_copies() {
    let mut s = store();
    let peer = PeerId::new("p1");
    let item = DeskItem::placed(DeskItemKind::Coffee, json!("latte"));
    let patch = PresencePatch { decorations: Some(vec![item.clone()]), ..PresencePatch::default() };
    s.apply_update(&peer, &update(1, patch, None, None));
    assert_eq!(s.get(&peer).map(|r| r.decorations.clone()), Some(vec![item]));
    // local mutations never reach remote items
    let remote_id = item_id(&s, &peer);
    assert_eq!(s.remove_desk_item(&remote_id), None);
}

// =============================================================================
// SCREEN PHANTOM
// =============================================================================

#[test]
fn derive_screen_record_is_idempotent_and_toggles_cleanly() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.apply_update(&peer, &update(1, named("Luna"), None, None));

    for _ in 0..3 {
        s.derive_screen_record(&peer, true);
    }
    assert_eq!(s.records().iter().filter(|r| r.is_screen_share).count(), 1);

    s.derive_screen_record(&peer, false);
    s.derive_screen_record(&peer, true);
    s.derive_screen_record(&peer, false);
    assert_eq!(s.records().iter().filter(|r| r.is_screen_share).count(), 0);
}

#[test]
fn phantom_follows_hint_and_owner_name() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.apply_update(&peer, &update(1, named("Luna"), Some("cam"), Some("scr")));
    let phantom = s.get(&peer.screen()).expect("phantom");
    assert_eq!(phantom.display_name, "Luna's Screen");
    assert!(phantom.muted);
    assert!(phantom.decorations.is_empty());

    s.apply_update(&peer, &update(2, named("Kai"), Some("cam"), Some("scr")));
    assert_eq!(s.get(&peer.screen()).map(|r| r.display_name.as_str()), Some("Kai's Screen"));

    s.apply_update(&peer, &update(3, PresencePatch::default(), Some("cam"), None));
    assert!(s.get(&peer.screen()).is_none());
}

#[test]
fn null_hint_parks_stream_until_hint_returns() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.apply_update(&peer, &update(1, named("Luna"), Some("cam"), Some("scr")));
    s.bind_primary(&peer, stream("cam"));
    s.bind_screen(&peer, stream("scr"));

    s.apply_update(&peer, &update(2, PresencePatch::default(), Some("cam"), None));
    assert!(s.get(&peer.screen()).is_none());
    assert_eq!(s.parked(&peer).len(), 1);
    assert_eq!(bound(&s, "p1").as_deref(), Some("cam"));

    s.apply_update(&peer, &update(3, PresencePatch::default(), Some("cam"), Some("scr")));
    assert_eq!(bound(&s, "p1-screen").as_deref(), Some("scr"));
    assert!(s.parked(&peer).is_empty());
}

#[test]
fn unbind_clears_wherever_the_stream_sits() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.ensure_peer(&peer);
    s.bind_primary(&peer, stream("cam"));
    s.bind_screen(&peer, stream("scr"));

    assert!(s.unbind(&peer, &StreamId::new("scr")));
    assert_eq!(bound(&s, "p1-screen"), None);
    assert!(!s.unbind(&peer, &StreamId::new("scr")));
    s.park(&peer, stream("old"));
    assert!(s.unbind(&peer, &StreamId::new("old")));
    assert!(s.parked(&peer).is_empty());
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[test]
fn remove_peer_takes_the_phantom_along() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.apply_update(&peer, &update(1, named("Luna"), Some("cam"), Some("scr")));
    s.apply_update(&PeerId::new("p2"), &update(1, named("Kai"), None, None));

    assert!(s.remove_peer(&peer));
    assert!(s.get(&peer).is_none());
    assert!(s.get(&peer.screen()).is_none());
    assert_eq!(s.remote_peers(), vec![PeerId::new("p2")]);
    assert!(!s.remove_peer(&peer));
}

#[test]
fn link_state_applies_to_owner_and_phantom() {
    let mut s = store();
    let peer = PeerId::new("p1");
    s.apply_update(&peer, &update(1, named("Luna"), None, Some("scr")));
    s.set_link_state(&peer, LinkState::Failed);
    assert_eq!(s.get(&peer).map(|r| r.link), Some(LinkState::Failed));
    assert_eq!(s.get(&peer.screen()).map(|r| r.link), Some(LinkState::Failed));
}

#[test]
fn records_render_local_first() {
    let mut s = store();
    s.set_local_screen(Some(stream("my-screen")));
    s.apply_update(&PeerId::new("b"), &update(1, named("B"), None, None));
    s.apply_update(&PeerId::new("a"), &update(1, named("A"), None, None));

    let order: Vec<String> = s.records().iter().map(|r| r.peer_id.to_string()).collect();
    assert_eq!(order, vec!["me", "me-screen", "a", "b"]);
}

// =============================================================================
// LOCAL
// =============================================================================

#[test]
fn local_update_carries_current_hints() {
    let mut s = store();
    s.set_local_stream(Some(stream("cam")));
    s.set_local_screen(Some(stream("scr")));
    let u = s.local_update(PresencePatch::default());
    assert_eq!(u.camera_stream, Some(StreamId::new("cam")));
    assert_eq!(u.screen_stream, Some(StreamId::new("scr")));

    s.set_local_screen(None);
    assert!(s.local_screen().is_none());
    assert_eq!(s.local_update(PresencePatch::default()).screen_stream, None);
}

#[test]
fn local_screen_phantom_is_named_and_muted() {
    let mut s = store();
    s.set_local_screen(Some(stream("scr")));
    let screen = s.local_screen().expect("phantom");
    assert_eq!(screen.display_name, "Mika's Screen");
    assert!(screen.muted);
    assert!(!screen.is_local);

    s.set_display_name("Miko");
    assert_eq!(s.local_screen().map(|r| r.display_name.as_str()), Some("Miko's Screen"));
}

#[test]
fn snapshot_describes_the_whole_local_record() {
    let mut s = store();
    s.set_video_off(true);
    let snap = s.local_snapshot();
    assert_eq!(snap.patch.display_name.as_deref(), Some("Mika"));
    assert_eq!(snap.patch.avatar_ref.as_deref(), Some("avatar://mika"));
    assert_eq!(snap.patch.video_off, Some(true));
    assert_eq!(snap.patch.decorations, Some(Vec::new()));
    assert!(snap.ts > 0);
}

#[test]
fn muting_silences_speaking() {
    let mut s = store();
    s.set_speaking(true);
    let patch = s.set_muted(true);
    assert_eq!(patch.speaking, Some(false));
    assert!(!s.local().speaking);
    assert_eq!(s.set_muted(false).speaking, None);
}

#[test]
fn desk_items_are_placed_moved_updated_and_removed() {
    let mut s = store();
    let (id, patch) = s.add_desk_item(DeskItemKind::Note, json!({"text": "hi"}));
    assert_eq!(patch.decorations.as_ref().map(Vec::len), Some(1));

    let patch = s.move_desk_item(&id, 150.0, -3.0).expect("moved");
    let item = &patch.decorations.expect("decorations")[0];
    assert!((item.x - 100.0).abs() < f64::EPSILON);
    assert!(item.y.abs() < f64::EPSILON);

    s.update_desk_item(&id, json!({"text": "bye"})).expect("updated");
    assert_eq!(s.local().decorations[0].payload, json!({"text": "bye"}));

    assert!(s.remove_desk_item(&id).is_some());
    assert!(s.local().decorations.is_empty());
    assert!(s.remove_desk_item(&id).is_none());
    assert!(s.move_desk_item(&id, 1.0, 1.0).is_none());
}
