//! WebSocket handler: signaling relay for one peer.
//!
//! DESIGN
//! ======
//! On upgrade, generates a peer id and enters a `select!` loop:
//! - Incoming client frames -> decode + dispatch by syscall prefix
//! - Frames fanned out by room peers -> forward to client
//!
//! Handler functions validate and return an `Outcome`. The dispatch layer
//! owns all outbound concerns: reply to sender, broadcast, or deliver to one
//! peer. The relay never inspects signal, presence, or whiteboard payloads.
//!
//! Each connection answers in the encoding it last received: binary
//! protobuf frames or JSON text frames.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade -> send `session:connected` with `peer_id`
//! 2. `room:join` -> announce `peer:joined`, reply with existing `peers`
//! 3. Client frames -> dispatch -> handler returns Outcome
//! 4. `room:leave` or socket close -> announce `peer:left` -> cleanup

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use frames::Frame;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::room::{self, RelayError};
use crate::state::AppState;

pub const SESSION_CONNECTED: &str = "session:connected";
const GATEWAY_ERROR: &str = "gateway:error";

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. Handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Send done+data to sender only.
    Reply(Value),
    /// Send empty done to sender only.
    Done,
    /// Forward the request to every room peer except the sender. No reply.
    BroadcastExcludeSender,
    /// Forward the request to one room peer. No reply.
    Relay { to: String },
}

/// Per-connection context threaded through dispatch.
struct Conn {
    peer_id: String,
    room: Option<String>,
    tx: mpsc::Sender<Frame>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Encoding {
    Binary,
    Text,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let peer_id = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::channel::<Frame>(state.config.client_queue);
    let mut conn = Conn { peer_id: peer_id.clone(), room: None, tx };
    let mut encoding = Encoding::Binary;

    let welcome = Frame::request(SESSION_CONNECTED, json!({ "peer_id": peer_id }));
    if send_frame(&mut socket, encoding, &welcome).await.is_err() {
        return;
    }
    info!(%peer_id, "ws: peer connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let decoded = match msg {
                    Message::Binary(bytes) => {
                        encoding = Encoding::Binary;
                        frames::decode_frame(&bytes)
                    }
                    Message::Text(text) => {
                        encoding = Encoding::Text;
                        frames::decode_json(&text)
                    }
                    Message::Close(_) => break,
                    _ => continue,
                };
                let replies = match decoded {
                    Ok(frame) => process_inbound(&state, &mut conn, frame).await,
                    Err(e) => {
                        warn!(%peer_id, error = %e, "ws: undecodable frame");
                        vec![Frame::request(GATEWAY_ERROR, Value::Null).error_from(&RelayError::BadFrame(e.to_string()))]
                    }
                };
                for frame in replies {
                    let _ = send_frame(&mut socket, encoding, &frame).await;
                }
            }
            Some(frame) = rx.recv() => {
                if send_frame(&mut socket, encoding, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(room_id) = conn.room.take() {
        room::part(&state, &room_id, &peer_id).await;
    }
    info!(%peer_id, "ws: peer disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Dispatch one inbound frame and return frames for the sender.
async fn process_inbound(state: &AppState, conn: &mut Conn, mut req: Frame) -> Vec<Frame> {
    // Identity comes from the connection, never from the client.
    req.from = Some(conn.peer_id.clone());
    debug!(peer_id = %conn.peer_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "room" => handle_room(state, conn, &req).await,
        "signal" => handle_signal(conn, &req),
        "presence" | "whiteboard" => joined(conn).map(|_| Outcome::BroadcastExcludeSender),
        _ => Err(RelayError::UnknownSyscall(req.syscall.clone())),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done_with(json!({}))],
        Ok(Outcome::BroadcastExcludeSender) => {
            if let Some(room_id) = conn.room.as_deref() {
                let frame = req.with_room(room_id);
                room::broadcast(state, room_id, &frame, Some(&conn.peer_id)).await;
            }
            vec![]
        }
        Ok(Outcome::Relay { to }) => {
            let Some(room_id) = conn.room.clone() else {
                return vec![req.error_from(&RelayError::NotJoined)];
            };
            let frame = req.clone().with_room(&room_id);
            match room::send_to(state, &room_id, &to, &frame).await {
                Ok(()) => vec![],
                Err(e) => vec![req.error_from(&e)],
            }
        }
        Err(e) => {
            warn!(peer_id = %conn.peer_id, syscall = %req.syscall, error = %e, "ws: request rejected");
            vec![req.error_from(&e)]
        }
    }
}

fn joined(conn: &Conn) -> Result<&str, RelayError> {
    conn.room.as_deref().ok_or(RelayError::NotJoined)
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn handle_room(state: &AppState, conn: &mut Conn, req: &Frame) -> Result<Outcome, RelayError> {
    match req.op() {
        "join" => {
            let room_id = req
                .room_id
                .clone()
                .or_else(|| req.str_field("room").map(str::to_owned))
                .filter(|r| !r.is_empty())
                .ok_or(RelayError::MissingRoom)?;
            if let Some(previous) = conn.room.take() {
                room::part(state, &previous, &conn.peer_id).await;
            }
            let presence = req.data.get("presence").cloned().unwrap_or(Value::Null);
            let peers = room::join(state, &room_id, &conn.peer_id, conn.tx.clone(), presence).await;
            conn.room = Some(room_id);
            Ok(Outcome::Reply(json!({ "peer_id": conn.peer_id, "peers": peers })))
        }
        "leave" => {
            let room_id = conn.room.take().ok_or(RelayError::NotJoined)?;
            room::part(state, &room_id, &conn.peer_id).await;
            Ok(Outcome::Done)
        }
        _ => Err(RelayError::UnknownSyscall(req.syscall.clone())),
    }
}

fn handle_signal(conn: &Conn, req: &Frame) -> Result<Outcome, RelayError> {
    if req.op() != "relay" {
        return Err(RelayError::UnknownSyscall(req.syscall.clone()));
    }
    joined(conn)?;
    let to = req.to.clone().filter(|t| !t.is_empty()).ok_or(RelayError::MissingTarget)?;
    Ok(Outcome::Relay { to })
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, encoding: Encoding, frame: &Frame) -> Result<(), axum::Error> {
    if frame.status == frames::Status::Error {
        let code = frame.str_field(frames::FRAME_CODE).unwrap_or("-");
        let message = frame.str_field(frames::FRAME_MESSAGE).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    let message = match encoding {
        Encoding::Binary => Message::Binary(frames::encode_frame(frame).into()),
        Encoding::Text => Message::Text(frames::encode_json(frame).into()),
    };
    socket.send(message).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
