use super::*;
use crate::config::RelayConfig;
use frames::ErrorCode;

fn state() -> AppState {
    AppState::new(RelayConfig::default())
}

fn client() -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    mpsc::channel(8)
}

#[tokio::test]
async fn join_returns_existing_members_and_announces_newcomer() {
    let state = state();
    let (tx_a, mut rx_a) = client();
    let (tx_b, mut rx_b) = client();

    assert!(join(&state, "r1", "a", tx_a, Value::Null).await.is_empty());
    let existing = join(&state, "r1", "b", tx_b, json!({"displayName": "Bo"})).await;
    assert_eq!(existing, vec!["a".to_owned()]);

    let notice = rx_a.try_recv().expect("peer:joined");
    assert_eq!(notice.syscall, PEER_JOINED);
    assert_eq!(notice.str_field("peer_id"), Some("b"));
    assert_eq!(notice.data["presence"]["displayName"], "Bo");
    assert!(rx_b.try_recv().is_err(), "joiner is not told about itself");
}

#[tokio::test]
async fn rooms_are_isolated() {
    let state = state();
    let (tx_a, mut rx_a) = client();
    let (tx_b, _rx_b) = client();
    join(&state, "r1", "a", tx_a, Value::Null).await;
    join(&state, "r2", "b", tx_b, Value::Null).await;

    assert!(rx_a.try_recv().is_err());
    assert_eq!(members(&state, "r1").await, vec!["a".to_owned()]);
    assert_eq!(members(&state, "r2").await, vec!["b".to_owned()]);
}

#[tokio::test]
async fn part_announces_and_evicts_empty_rooms() {
    let state = state();
    let (tx_a, mut rx_a) = client();
    let (tx_b, _rx_b) = client();
    join(&state, "r1", "a", tx_a, Value::Null).await;
    join(&state, "r1", "b", tx_b, Value::Null).await;
    rx_a.try_recv().expect("joined notice");

    assert!(part(&state, "r1", "b").await);
    let notice = rx_a.try_recv().expect("peer:left");
    assert_eq!(notice.syscall, PEER_LEFT);
    assert_eq!(notice.str_field("peer_id"), Some("b"));

    assert!(!part(&state, "r1", "b").await);
    assert!(part(&state, "r1", "a").await);
    assert!(state.rooms.read().await.is_empty());
}

#[tokio::test]
async fn broadcast_skips_the_sender() {
    let state = state();
    let (tx_a, mut rx_a) = client();
    let (tx_b, mut rx_b) = client();
    join(&state, "r1", "a", tx_a, Value::Null).await;
    join(&state, "r1", "b", tx_b, Value::Null).await;
    rx_a.try_recv().expect("joined notice");

    let frame = Frame::request("presence:update", json!({"muted": true})).with_from("a");
    broadcast(&state, "r1", &frame, Some("a")).await;

    assert!(rx_a.try_recv().is_err());
    assert_eq!(rx_b.try_recv().expect("presence").data["muted"], true);
}

#[tokio::test]
async fn send_to_reaches_one_peer_or_reports_unknown() {
    let state = state();
    let (tx_a, _rx_a) = client();
    let (tx_b, mut rx_b) = client();
    join(&state, "r1", "a", tx_a, Value::Null).await;
    join(&state, "r1", "b", tx_b, Value::Null).await;

    let frame = Frame::request("signal:relay", json!({"kind": "offer"})).with_to("b");
    send_to(&state, "r1", "b", &frame).await.expect("delivered");
    assert_eq!(rx_b.try_recv().expect("signal").syscall, "signal:relay");

    let err = send_to(&state, "r1", "ghost", &frame).await.expect_err("unknown");
    assert_eq!(err.error_code(), "E_UNKNOWN_PEER");
}

#[tokio::test]
async fn full_queue_drops_instead_of_blocking() {
    let state = state();
    let (tx_a, mut rx_a) = mpsc::channel(1);
    join(&state, "r1", "a", tx_a, Value::Null).await;

    let frame = Frame::request("whiteboard:action", Value::Null);
    broadcast(&state, "r1", &frame, None).await;
    broadcast(&state, "r1", &frame, None).await;

    assert!(rx_a.try_recv().is_ok());
    assert!(rx_a.try_recv().is_err());
}
