use tokio::sync::mpsc;

use super::*;
use crate::peer::ConnectionEvent;
use crate::protocol::{Outbound, SignalKind};
use crate::transport::Outbox;

struct Ends {
    connection: Arc<dyn PeerConnection>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

fn connect(connector: &SyntheticConnector, remote: &str) -> Ends {
    let (ev_tx, events) = mpsc::unbounded_channel();
    let (out_tx, outbound) = mpsc::unbounded_channel();
    let sink = ConnectionEvents::new(PeerId::new(remote), ev_tx, Outbox::new(out_tx));
    let connection = connector.connect(&PeerId::new(remote), sink).expect("connect");
    Ends { connection, events, outbound }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn stream(id: &str) -> MediaStreamHandle {
    MediaStreamHandle::new(StreamId::new(id), Vec::new())
}

#[tokio::test]
async fn camera_can_be_denied() {
    let devices = SyntheticDevices::new().deny_camera();
    assert!(matches!(devices.user_media().await, Err(CaptureError::PermissionDenied)));
}

#[tokio::test]
async fn camera_has_audio_and_video() {
    let capture = SyntheticDevices::new().user_media().await.expect("camera");
    assert_eq!(capture.stream.is_enabled(TrackKind::Audio), Some(true));
    assert_eq!(capture.stream.is_enabled(TrackKind::Video), Some(true));
    assert!(capture.ended.is_none());
}

#[tokio::test]
async fn ending_a_screen_fires_its_receiver_once() {
    let devices = SyntheticDevices::new();
    let capture = devices.display_media().await.expect("screen");
    let id = capture.stream.id.clone();

    assert!(devices.end_screen(&id));
    assert!(capture.ended.expect("ended").await.is_ok());
    assert!(!devices.end_screen(&id));
}

#[tokio::test]
async fn stopped_screen_can_no_longer_be_ended() {
    let devices = SyntheticDevices::new();
    let capture = devices.display_media().await.expect("screen");
    devices.stop(&capture.stream);

    assert!(!devices.end_screen(&capture.stream.id));
    assert_eq!(devices.stopped(), vec![capture.stream.id]);
}

#[tokio::test]
async fn offer_answer_exchanges_streams_both_ways() {
    let connector = SyntheticConnector::new();
    let mut a = connect(&connector, "b");
    let mut b = connect(&connector, "a");
    a.connection.add_stream(&stream("a-cam"));
    b.connection.add_stream(&stream("b-cam"));

    let offer = a.connection.offer().await.expect("offer");
    let answer = b.connection.accept_offer(&offer).await.expect("answer");
    a.connection.accept_answer(&answer).await.expect("accept");

    assert_eq!(
        drain(&mut b.events),
        vec![
            ConnectionEvent::TrackReceived { peer: PeerId::new("a"), stream: stream("a-cam") },
            ConnectionEvent::StateChanged { peer: PeerId::new("a"), state: LinkState::Connected },
        ]
    );
    assert_eq!(
        drain(&mut a.events),
        vec![
            ConnectionEvent::TrackReceived { peer: PeerId::new("b"), stream: stream("b-cam") },
            ConnectionEvent::StateChanged { peer: PeerId::new("b"), state: LinkState::Connected },
        ]
    );
    match a.outbound.try_recv().expect("candidate") {
        Outbound::Signal { to, signal } => {
            assert_eq!(to, PeerId::new("b"));
            assert_eq!(signal.kind, SignalKind::Candidate);
        }
        other => panic!("unexpected outbound {other:?}"),
    }
}

#[tokio::test]
async fn renegotiation_reports_removed_streams() {
    let connector = SyntheticConnector::new();
    let a = connect(&connector, "b");
    let mut b = connect(&connector, "a");
    a.connection.add_stream(&stream("cam"));
    a.connection.add_stream(&stream("screen"));
    b.connection.accept_offer(&a.connection.offer().await.expect("offer")).await.expect("answer");
    drain(&mut b.events);

    a.connection.remove_stream(&StreamId::new("screen"));
    b.connection.accept_offer(&a.connection.offer().await.expect("offer")).await.expect("answer");
    assert_eq!(
        drain(&mut b.events),
        vec![ConnectionEvent::TrackRemoved { peer: PeerId::new("a"), stream_id: StreamId::new("screen") }]
    );
}

#[tokio::test]
async fn garbage_description_is_an_sdp_error() {
    let connector = SyntheticConnector::new();
    let b = connect(&connector, "a");
    assert!(matches!(b.connection.accept_offer("v=0 not json").await, Err(NegotiationError::Sdp(_))));
}

#[tokio::test]
async fn unreachable_peer_fails_every_step() {
    let connector = SyntheticConnector::new();
    connector.fail_peer(&PeerId::new("far"));
    let far = connect(&connector, "far");
    let near = connect(&connector, "near");

    assert!(matches!(far.connection.offer().await, Err(NegotiationError::Ice(_))));
    assert!(near.connection.offer().await.is_ok());
}

#[tokio::test]
async fn closed_connection_rejects_negotiation() {
    let connector = SyntheticConnector::new();
    let mut a = connect(&connector, "b");
    a.connection.close().await;
    a.connection.close().await;

    assert!(matches!(a.connection.offer().await, Err(NegotiationError::Closed)));
    assert_eq!(
        drain(&mut a.events),
        vec![ConnectionEvent::StateChanged { peer: PeerId::new("b"), state: LinkState::Closed }]
    );
}
