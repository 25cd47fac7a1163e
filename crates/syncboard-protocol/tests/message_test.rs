// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire-shape tests for the frame boundary: tag set, field casing, and the
//! replay re-entry path.

use syncboard_protocol::{
    decode_client_message, decode_queued_operation, encode_server_message, ClientMessage,
    ColumnId, ErrorPayload, ServerMessage,
};

#[test]
fn test_every_client_tag_dispatches() {
    let frames = [
        r#"{"type":"SYNC_REQUEST","payload":{"clientId":"c1"}}"#,
        r#"{"type":"CREATE_TASK","payload":{"clientId":"c1","tempId":"tmp1","columnId":"todo"}}"#,
        r#"{"type":"UPDATE_TASK","payload":{"clientId":"c1","taskId":"t1","baseVersion":1,"changes":{"title":"x"}}}"#,
        r#"{"type":"MOVE_TASK","payload":{"clientId":"c1","taskId":"t1","baseVersion":1,"columnId":"done","position":65536}}"#,
        r#"{"type":"DELETE_TASK","payload":{"clientId":"c1","taskId":"t1","baseVersion":1}}"#,
        r#"{"type":"PRESENCE_UPDATE","payload":{"clientId":"c1","username":"Ada","viewingTask":"t1"}}"#,
        r#"{"type":"REPLAY_QUEUE","payload":{"clientId":"c1","operations":[]}}"#,
    ];
    for frame in frames {
        decode_client_message(frame).unwrap_or_else(|e| panic!("{frame}: {e}"));
    }
}

#[test]
fn test_create_without_position_appends() {
    let msg = decode_client_message(
        r#"{"type":"CREATE_TASK","payload":{"clientId":"c1","tempId":"tmp1","columnId":"inprogress"}}"#,
    )
    .unwrap();
    let ClientMessage::CreateTask(payload) = msg else {
        panic!("wrong variant");
    };
    assert_eq!(payload.column_id, ColumnId::Inprogress);
    assert!(payload.position.is_none());
    assert!(payload.title.is_none());
}

#[test]
fn test_replay_operations_reenter_the_codec() {
    let msg = decode_client_message(
        r#"{
            "type": "REPLAY_QUEUE",
            "payload": {
                "clientId": "c1",
                "operations": [
                    {
                        "type": "UPDATE_TASK",
                        "payload": {
                            "clientId": "c1",
                            "taskId": "t1",
                            "baseVersion": 1,
                            "changes": { "title": "offline edit" }
                        },
                        "enqueuedAt": 1712345678901
                    },
                    { "type": "WHATEVER", "payload": {} }
                ]
            }
        }"#,
    )
    .unwrap();
    let ClientMessage::ReplayQueue(payload) = msg else {
        panic!("wrong variant");
    };

    let first = decode_queued_operation(&payload.operations[0]).unwrap();
    assert!(matches!(first, ClientMessage::UpdateTask(_)));

    let second = decode_queued_operation(&payload.operations[1]).unwrap_err();
    assert_eq!(second.code(), "UNKNOWN_MESSAGE_TYPE");
}

#[test]
fn test_server_frames_carry_screaming_tags() {
    let encoded = encode_server_message(&ServerMessage::Error(ErrorPayload {
        code: "NOT_FOUND".into(),
        message: "Task 't1' not found".into(),
        task_id: Some("t1".into()),
    }))
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(value["type"], "ERROR");
    assert_eq!(value["payload"]["code"], "NOT_FOUND");
    assert_eq!(value["payload"]["taskId"], "t1");
}
