use std::sync::Arc;

use cozycorner::peer::LinkState;
use cozycorner::synthetic::{SyntheticConnector, SyntheticDevices};
use cozycorner::{Command, PeerId, Profile, RelayTransport, RoomId, SessionConfig, SessionHandle};
use frames::{ErrorCode, Status};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite;

use super::*;
use crate::config::RelayConfig;

fn state() -> AppState {
    AppState::new(RelayConfig::default())
}

fn conn(peer: &str) -> (Conn, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(16);
    (Conn { peer_id: peer.to_owned(), room: None, tx }, rx)
}

fn join_frame(room_id: &str) -> Frame {
    Frame::request("room:join", json!({ "presence": { "displayName": "Ada" } })).with_room(room_id)
}

async fn joined_pair(state: &AppState) -> ((Conn, mpsc::Receiver<Frame>), (Conn, mpsc::Receiver<Frame>)) {
    let (mut a, a_rx) = conn("a");
    let (mut b, b_rx) = conn("b");
    process_inbound(state, &mut a, join_frame("r1")).await;
    process_inbound(state, &mut b, join_frame("r1")).await;
    ((a, a_rx), (b, b_rx))
}

fn code(frame: &Frame) -> Option<&str> {
    frame.str_field(frames::FRAME_CODE)
}

async fn recv(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("client channel closed unexpectedly")
}

// =============================================================================
// DISPATCH
// =============================================================================

#[tokio::test]
async fn room_join_replies_with_identity_and_existing_peers() {
    let state = state();
    let ((_a, mut a_rx), (b, _b_rx)) = joined_pair(&state).await;
    assert_eq!(b.room.as_deref(), Some("r1"));

    let notice = recv(&mut a_rx).await;
    assert_eq!(notice.syscall, room::PEER_JOINED);
    assert_eq!(notice.str_field("peer_id"), Some("b"));
    assert_eq!(notice.data["presence"]["displayName"], "Ada");

    let (mut c, _c_rx) = conn("c");
    let reply = process_inbound(&state, &mut c, join_frame("r1")).await;
    assert_eq!(reply.len(), 1);
    assert_eq!(reply[0].status, Status::Done);
    assert_eq!(reply[0].str_field("peer_id"), Some("c"));
    assert_eq!(reply[0].data["peers"], json!(["a", "b"]));
}

#[tokio::test]
async fn room_join_requires_a_room_id() {
    let state = state();
    let (mut a, _rx) = conn("a");
    let reply = process_inbound(&state, &mut a, Frame::request("room:join", Value::Null)).await;
    assert_eq!(reply[0].status, Status::Error);
    assert_eq!(code(&reply[0]), Some("E_MISSING_ROOM"));
    assert!(a.room.is_none());
}

#[tokio::test]
async fn frames_before_join_are_rejected() {
    let state = state();
    let (mut a, _rx) = conn("a");
    for syscall in ["presence:update", "whiteboard:action", "room:leave"] {
        let reply = process_inbound(&state, &mut a, Frame::request(syscall, Value::Null)).await;
        assert_eq!(code(&reply[0]), Some("E_NOT_JOINED"), "{syscall}");
    }
    let signal = Frame::request("signal:relay", json!({"kind": "offer"})).with_to("b");
    let reply = process_inbound(&state, &mut a, signal).await;
    assert_eq!(code(&reply[0]), Some("E_NOT_JOINED"));
}

#[tokio::test]
async fn unknown_syscall_is_an_error() {
    let state = state();
    let (mut a, _rx) = conn("a");
    let reply = process_inbound(&state, &mut a, Frame::request("board:join", Value::Null)).await;
    assert_eq!(code(&reply[0]), Some("E_UNKNOWN_SYSCALL"));
    assert_eq!(RelayError::UnknownSyscall("x".into()).error_code(), "E_UNKNOWN_SYSCALL");
}

#[tokio::test]
async fn presence_fans_out_with_sender_stamped() {
    let state = state();
    let ((mut a, mut a_rx), (_b, mut b_rx)) = joined_pair(&state).await;
    recv(&mut a_rx).await;

    let mut update = Frame::request("presence:update", json!({"muted": true}));
    update.from = Some("spoofed".into());
    let reply = process_inbound(&state, &mut a, update).await;
    assert!(reply.is_empty());

    let seen = recv(&mut b_rx).await;
    assert_eq!(seen.syscall, "presence:update");
    assert_eq!(seen.from.as_deref(), Some("a"));
    assert_eq!(seen.room_id.as_deref(), Some("r1"));
    assert_eq!(seen.data["muted"], true);
    assert!(a_rx.try_recv().is_err(), "sender gets no echo");
}

#[tokio::test]
async fn signal_reaches_only_its_target() {
    let state = state();
    let ((mut a, mut a_rx), (_b, mut b_rx)) = joined_pair(&state).await;
    let (mut c, mut c_rx) = conn("c");
    process_inbound(&state, &mut c, join_frame("r1")).await;
    recv(&mut a_rx).await;
    recv(&mut a_rx).await;
    recv(&mut b_rx).await;

    let offer = Frame::request("signal:relay", json!({"kind": "offer", "payload": {"sdp": "x"}})).with_to("c");
    assert!(process_inbound(&state, &mut a, offer).await.is_empty());

    let seen = recv(&mut c_rx).await;
    assert_eq!(seen.from.as_deref(), Some("a"));
    assert_eq!(seen.data["payload"]["sdp"], "x");
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn signal_needs_a_known_target() {
    let state = state();
    let ((mut a, _a_rx), _) = joined_pair(&state).await;

    let untargeted = Frame::request("signal:relay", json!({"kind": "offer"}));
    let reply = process_inbound(&state, &mut a, untargeted).await;
    assert_eq!(code(&reply[0]), Some("E_MISSING_TARGET"));

    let stray = Frame::request("signal:relay", json!({"kind": "offer"})).with_to("ghost");
    let reply = process_inbound(&state, &mut a, stray).await;
    assert_eq!(code(&reply[0]), Some("E_UNKNOWN_PEER"));
}

#[tokio::test]
async fn room_leave_announces_and_clears_membership() {
    let state = state();
    let ((_a, mut a_rx), (mut b, _b_rx)) = joined_pair(&state).await;
    recv(&mut a_rx).await;

    let reply = process_inbound(&state, &mut b, Frame::request("room:leave", Value::Null)).await;
    assert_eq!(reply[0].status, Status::Done);
    assert!(b.room.is_none());

    let notice = recv(&mut a_rx).await;
    assert_eq!(notice.syscall, room::PEER_LEFT);
    assert_eq!(notice.str_field("peer_id"), Some("b"));
    assert_eq!(room::members(&state, "r1").await, vec!["a".to_owned()]);
}

#[tokio::test]
async fn joining_another_room_parts_the_first() {
    let state = state();
    let ((_a, mut a_rx), (mut b, _b_rx)) = joined_pair(&state).await;
    recv(&mut a_rx).await;

    process_inbound(&state, &mut b, join_frame("r2")).await;
    assert_eq!(recv(&mut a_rx).await.syscall, room::PEER_LEFT);
    assert_eq!(room::members(&state, "r2").await, vec!["b".to_owned()]);
}

// =============================================================================
// END TO END
// =============================================================================

async fn serve() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, crate::routes::app(state())).await;
    });
    format!("ws://{addr}/ws")
}

async fn next_text(ws: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>) -> Frame {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("relay reply timed out")
            .expect("socket open")
            .expect("socket ok");
        if let tungstenite::Message::Text(text) = msg {
            return frames::decode_json(&text).expect("json frame");
        }
    }
}

#[tokio::test]
async fn text_clients_get_json_replies() {
    let url = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.expect("connect");

    // The welcome is sent before the client picks an encoding.
    let welcome = ws.next().await.expect("welcome").expect("ok");
    let tungstenite::Message::Binary(bytes) = welcome else { panic!("welcome should be binary") };
    let welcome = frames::decode_frame(&bytes).expect("frame");
    assert_eq!(welcome.syscall, SESSION_CONNECTED);
    let peer_id = welcome.str_field("peer_id").expect("peer id").to_owned();

    let join = join_frame("json-room");
    ws.send(tungstenite::Message::Text(frames::encode_json(&join).into())).await.expect("send");
    let reply = next_text(&mut ws).await;
    assert_eq!(reply.parent_id.as_deref(), Some(join.id.as_str()));
    assert_eq!(reply.str_field("peer_id"), Some(peer_id.as_str()));

    ws.send(tungstenite::Message::Text("not a frame".into())).await.expect("send");
    let err = next_text(&mut ws).await;
    assert_eq!(err.status, Status::Error);
    assert_eq!(code(&err), Some("E_BAD_FRAME"));
}

async fn relay_member(url: &str, room_id: &RoomId, name: &str) -> SessionHandle {
    cozycorner::join(
        SessionConfig::default(),
        Profile::new(name),
        room_id.clone(),
        Box::new(RelayTransport::new(url)),
        Arc::new(SyntheticDevices::new()),
        Arc::new(SyntheticConnector::new()),
    )
    .await
    .expect("join over relay")
}

async fn connected_to(viewer: &SessionHandle, peer: &PeerId, name: &str) {
    let name = name.to_owned();
    viewer
        .wait_until(Duration::from_secs(10), |v| {
            v.record(peer).is_some_and(|r| r.display_name == name && r.stream.is_some() && r.link == LinkState::Connected)
        })
        .await
        .expect("peer connected over relay");
}

#[tokio::test]
async fn two_sessions_meet_through_the_relay() {
    let url = serve().await;
    let room_id = RoomId::new("quiet-heron-412");
    let ada = relay_member(&url, &room_id, "Ada").await;
    let bo = relay_member(&url, &room_id, "Bo").await;

    connected_to(&ada, bo.local_id(), "Bo").await;
    connected_to(&bo, ada.local_id(), "Ada").await;

    ada.send(Command::ToggleMic).expect("live");
    let ada_id = ada.local_id().clone();
    bo.wait_until(Duration::from_secs(10), |v| v.record(&ada_id).is_some_and(|r| r.muted))
        .await
        .expect("mute propagated");

    ada.leave().await;
    bo.wait_until(Duration::from_secs(15), |v| v.record(&ada_id).is_none())
        .await
        .expect("departure observed");
}
