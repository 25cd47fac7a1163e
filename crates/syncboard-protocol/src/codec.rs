// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Frame encode/decode with boundary error classification.
//!
//! Decode failures fall into two wire-visible classes: frames that are not
//! valid JSON (or whose payload has the wrong shape) answer `INVALID_JSON`,
//! and syntactically fine frames with an unrecognized discriminator answer
//! `UNKNOWN_MESSAGE_TYPE`.

use serde_json::Value;

use crate::client::{ClientMessage, QueuedOperation};
use crate::server::ServerMessage;
use crate::types::ProtocolError;

/// Every discriminator a client may send.
const CLIENT_MESSAGE_TYPES: [&str; 7] = [
    "SYNC_REQUEST",
    "CREATE_TASK",
    "UPDATE_TASK",
    "MOVE_TASK",
    "DELETE_TASK",
    "PRESENCE_UPDATE",
    "REPLAY_QUEUE",
];

/// Decode a raw text frame into a [`ClientMessage`].
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, ProtocolError> {
    let value: Value = serde_json::from_str(raw)?;
    decode_client_value(value)
}

/// Decode an already-parsed JSON value into a [`ClientMessage`].
///
/// The discriminator is checked against the closed tag set before the
/// payload is deserialized, so unknown tags never surface as shape errors.
pub fn decode_client_value(value: Value) -> Result<ClientMessage, ProtocolError> {
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    if !CLIENT_MESSAGE_TYPES.contains(&tag) {
        return Err(ProtocolError::UnknownType(tag.to_string()));
    }

    Ok(serde_json::from_value(value)?)
}

/// Re-decode a queued offline operation as if it had arrived live.
pub fn decode_queued_operation(op: &QueuedOperation) -> Result<ClientMessage, ProtocolError> {
    decode_client_value(serde_json::json!({
        "type": op.kind,
        "payload": op.payload,
    }))
}

/// Encode a server message to its text-frame representation.
///
/// Broadcast paths call this once per fan-out and share the string.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_json_is_classified() {
        let err = decode_client_message("{not json").unwrap_err();
        assert_eq!(err.code(), "INVALID_JSON");
    }

    #[test]
    fn test_missing_type_is_invalid_json() {
        let err = decode_client_message(r#"{"payload":{}}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_JSON");
    }

    #[test]
    fn test_unknown_tag_is_classified() {
        let err = decode_client_message(r#"{"type":"TELEPORT_TASK","payload":{}}"#).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_MESSAGE_TYPE");
        assert!(err.to_string().contains("TELEPORT_TASK"));
    }

    #[test]
    fn test_known_tag_with_bad_payload_is_invalid_json() {
        let err = decode_client_message(r#"{"type":"MOVE_TASK","payload":{}}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_JSON");
    }

    #[test]
    fn test_queued_operation_round_trips() {
        let op = QueuedOperation {
            kind: "SYNC_REQUEST".into(),
            payload: serde_json::json!({ "clientId": "c1" }),
            enqueued_at: None,
        };
        let msg = decode_queued_operation(&op).unwrap();
        assert!(matches!(msg, ClientMessage::SyncRequest(_)));
    }

    #[test]
    fn test_queued_operation_unknown_type() {
        let op = QueuedOperation {
            kind: "NOPE".into(),
            payload: serde_json::json!({}),
            enqueued_at: None,
        };
        let err = decode_queued_operation(&op).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_MESSAGE_TYPE");
    }
}
