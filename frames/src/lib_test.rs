use super::*;

fn sample_frame() -> Frame {
    Frame {
        id: "id-1".to_owned(),
        parent_id: Some("parent-1".to_owned()),
        ts: 42,
        room_id: Some("cozy-nook-7".to_owned()),
        from: Some("peer-a".to_owned()),
        to: Some("peer-b".to_owned()),
        syscall: "signal:relay".to_owned(),
        status: Status::Request,
        data: serde_json::json!({
            "kind": "offer",
            "payload": {"sdp": "v=0", "streams": ["s1", "s2"]},
            "x": 1.25,
            "nil": null
        }),
    }
}

fn bare_wire(status: i32, data: Option<prost_types::Value>) -> Vec<u8> {
    let wire = WireFrame {
        id: "id-1".to_owned(),
        parent_id: None,
        ts: 1,
        room_id: None,
        from: None,
        syscall: "presence:update".to_owned(),
        status,
        data,
        to: None,
    };
    let mut bytes = Vec::new();
    wire.encode(&mut bytes).expect("encode");
    bytes
}

// =============================================================================
// STATUS
// =============================================================================

#[test]
fn status_numeric_mapping_matches_wire_enum() {
    assert_eq!(Status::Request.as_i32(), 0);
    assert_eq!(Status::Done.as_i32(), 1);
    assert_eq!(Status::Error.as_i32(), 2);
}

#[test]
fn status_from_wire_rejects_out_of_range_value() {
    let err = Status::from_i32(99).expect_err("status should be invalid");
    assert!(matches!(err, CodecError::InvalidStatus(99)));
}

#[test]
fn status_serializes_as_lowercase_json() {
    assert_eq!(serde_json::to_string(&Status::Done).expect("serialize"), "\"done\"");
    assert!(serde_json::from_str::<Status>("\"Error\"").is_err());
}

// =============================================================================
// PROTOBUF
// =============================================================================

#[test]
fn protobuf_round_trip_preserves_targeted_frame() {
    let frame = sample_frame();
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode should succeed");
    assert_eq!(decoded, frame);
    assert_eq!(decoded.to.as_deref(), Some("peer-b"));
}

#[test]
fn decode_frame_rejects_malformed_bytes() {
    let err = decode_frame(&[0xff, 0x00, 0x01]).expect_err("bytes should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_frame_rejects_invalid_wire_status() {
    let bytes = bare_wire(77, Some(json_to_proto_value(&serde_json::json!({}))));
    let err = decode_frame(&bytes).expect_err("status should fail");
    assert!(matches!(err, CodecError::InvalidStatus(77)));
}

#[test]
fn decode_frame_defaults_missing_data_to_empty_object() {
    let frame = decode_frame(&bare_wire(Status::Request.as_i32(), None)).expect("decode");
    assert_eq!(frame.data, serde_json::json!({}));
}

#[test]
fn decode_frame_converts_nan_number_to_json_null() {
    let data = prost_types::Value { kind: Some(prost_types::value::Kind::NumberValue(f64::NAN)) };
    let frame = decode_frame(&bare_wire(Status::Request.as_i32(), Some(data))).expect("decode");
    assert_eq!(frame.data, Value::Null);
}

#[test]
fn integral_numbers_come_back_as_integers() {
    let frame = Frame::request("presence:update", serde_json::json!({"ts": 1_700_000_000_123_i64, "x": 41.5}));
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded.data.get("ts"), Some(&serde_json::json!(1_700_000_000_123_i64)));
    assert_eq!(decoded.data.get("x"), Some(&serde_json::json!(41.5)));
}

// =============================================================================
// JSON
// =============================================================================

#[test]
fn json_round_trip_preserves_frame() {
    let frame = sample_frame();
    let decoded = decode_json(&encode_json(&frame)).expect("decode");
    assert_eq!(decoded, frame);
}

#[test]
fn json_frame_without_optional_fields_parses() {
    let text = r#"{"id":"x","ts":5,"syscall":"room:leave","status":"request"}"#;
    let frame = decode_json(text).expect("decode");
    assert_eq!(frame.syscall, "room:leave");
    assert!(frame.from.is_none());
    assert!(frame.to.is_none());
    assert_eq!(frame.data, serde_json::json!({}));
}

#[test]
fn decode_json_rejects_garbage() {
    let err = decode_json("not json").expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

#[test]
fn request_wraps_scalar_payloads() {
    let frame = Frame::request("room:join", serde_json::json!(3));
    assert_eq!(frame.data, serde_json::json!({"value": 3}));
    assert_eq!(frame.status, Status::Request);
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let req = Frame::request("room:join", Value::Null).with_room("cozy-loft-1");
    let done = req.done_with(serde_json::json!({"peer_id": "p1"}));

    assert_eq!(done.parent_id.as_deref(), Some(req.id.as_str()));
    assert_eq!(done.room_id.as_deref(), Some("cozy-loft-1"));
    assert_eq!(done.syscall, "room:join");
    assert_eq!(done.status, Status::Done);
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not joined")]
    struct NotJoined;

    impl ErrorCode for NotJoined {
        fn error_code(&self) -> &'static str {
            "E_NOT_JOINED"
        }
    }

    let req = Frame::request("presence:update", Value::Null);
    let err = req.error_from(&NotJoined);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.str_field(FRAME_CODE), Some("E_NOT_JOINED"));
    assert_eq!(err.str_field(FRAME_MESSAGE), Some("not joined"));
    assert_eq!(err.data.get(FRAME_RETRYABLE).and_then(Value::as_bool), Some(false));
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("whiteboard:action", Value::Null);
    assert_eq!(frame.prefix(), "whiteboard");
    assert_eq!(frame.op(), "action");

    let frame = Frame::request("noseparator", Value::Null);
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn with_data_inserts_into_object_payload() {
    let frame = Frame::request("peer:left", Value::Null).with_data("peer_id", "p9");
    assert_eq!(frame.str_field("peer_id"), Some("p9"));
}
