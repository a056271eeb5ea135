//! Relay backend: websocket client of the hub-and-spoke signaling server.
//!
//! LIFECYCLE
//! =========
//! 1. Connect, wait for `session:connected`
//! 2. Send `room:join`, wait for its terminal reply (`peer_id`, `peers`)
//! 3. Spawn a pump task: outbox -> binary frames, inbound frames -> events
//! 4. Socket loss -> one `Closed` event; `Outbound::Leave` -> clean close
//!
//! Frames that arrive while waiting for the join reply are replayed into the
//! event stream once the link is up, so an early `peer:joined` is not lost.

use async_trait::async_trait;
use frames::{Frame, Status};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::{Outbox, Transport, TransportError, TransportLink};
use crate::ids::{PeerId, RoomId};
use crate::protocol::{Outbound, PresenceUpdate, ROOM_JOIN, SESSION_CONNECTED, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Signaling over the `server` relay.
#[derive(Debug, Clone)]
pub struct RelayTransport {
    url: String,
}

impl RelayTransport {
    /// `url` is the relay's websocket endpoint, e.g. `ws://127.0.0.1:3000/ws`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn open(self: Box<Self>, room: &RoomId, presence: PresenceUpdate) -> Result<TransportLink, TransportError> {
        let (mut ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let mut early = Vec::new();
        wait_for(&mut ws, &mut early, |f| f.syscall == SESSION_CONNECTED).await?;

        let join = Outbound::Join { room: room.clone(), presence }.to_frame(room);
        let join_id = join.id.clone();
        send_frame(&mut ws, &join).await?;

        let reply = wait_for(&mut ws, &mut early, |f| f.parent_id.as_deref() == Some(join_id.as_str())).await?;
        if reply.status == Status::Error {
            return Err(TransportError::Rejected {
                syscall: ROOM_JOIN.to_owned(),
                message: reply.str_field(frames::FRAME_MESSAGE).unwrap_or("unknown relay error").to_owned(),
            });
        }
        let local_id = reply
            .str_field("peer_id")
            .map(PeerId::new)
            .ok_or(TransportError::Rejected { syscall: ROOM_JOIN.to_owned(), message: "missing peer_id".to_owned() })?;
        let existing: Vec<PeerId> = reply
            .data
            .get("peers")
            .and_then(Value::as_array)
            .map(|peers| peers.iter().filter_map(Value::as_str).map(PeerId::new).collect())
            .unwrap_or_default();

        info!(%room, peer = %local_id, existing = existing.len(), "relay: joined room");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        for frame in &early {
            forward(frame, &ev_tx);
        }
        tokio::spawn(pump(ws, room.clone(), out_rx, ev_tx));

        Ok(TransportLink { local_id, existing, outbox: Outbox::new(out_tx), events: ev_rx })
    }
}

// =============================================================================
// PUMP
// =============================================================================

async fn pump(
    mut ws: WsStream,
    room: RoomId,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let reason = loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(msg) = msg else {
                    let _ = ws.close(None).await;
                    debug!(%room, "relay: outbox dropped, closing");
                    return;
                };
                let leaving = matches!(msg, Outbound::Leave);
                if let Err(e) = send_frame(&mut ws, &msg.to_frame(&room)).await {
                    break e.to_string();
                }
                if leaving {
                    let _ = ws.close(None).await;
                    info!(%room, "relay: left room");
                    return;
                }
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Binary(bytes))) => match frames::decode_frame(&bytes) {
                        Ok(frame) => forward(&frame, &events),
                        Err(e) => warn!(%room, error = %e, "relay: undecodable frame"),
                    },
                    Some(Ok(Message::Text(text))) => match frames::decode_json(&text) {
                        Ok(frame) => forward(&frame, &events),
                        Err(e) => warn!(%room, error = %e, "relay: undecodable frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break "relay closed the connection".to_owned(),
                    Some(Err(e)) => break format!("websocket error: {e}"),
                    Some(Ok(_)) => {}
                }
            }
        }
    };

    error!(%room, %reason, "relay: signaling lost");
    let _ = events.send(TransportEvent::Closed { reason });
}

fn forward(frame: &Frame, events: &mpsc::UnboundedSender<TransportEvent>) {
    if frame.status == Status::Error {
        let code = frame.str_field(frames::FRAME_CODE).unwrap_or("-");
        let message = frame.str_field(frames::FRAME_MESSAGE).unwrap_or("-");
        warn!(syscall = %frame.syscall, code, message, "relay: error frame");
        return;
    }
    if let Some(event) = TransportEvent::from_frame(frame) {
        let _ = events.send(event);
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(ws: &mut WsStream, frame: &Frame) -> Result<(), TransportError> {
    ws.send(Message::Binary(frames::encode_frame(frame).into()))
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))
}

/// Read frames until `pred` matches; everything else is stashed in `early`.
async fn wait_for(ws: &mut WsStream, early: &mut Vec<Frame>, pred: impl Fn(&Frame) -> bool) -> Result<Frame, TransportError> {
    loop {
        let Some(message) = ws.next().await else {
            return Err(TransportError::Closed);
        };
        let frame = match message.map_err(|e| TransportError::Connect(e.to_string()))? {
            Message::Binary(bytes) => frames::decode_frame(&bytes)?,
            Message::Text(text) => frames::decode_json(&text)?,
            Message::Close(_) => return Err(TransportError::Closed),
            _ => continue,
        };
        if pred(&frame) {
            return Ok(frame);
        }
        early.push(frame);
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
