// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;

#[test]
fn execute_message_wire_shape() {
    let msg = ClientMessage::execute(7, "abc", OperationKind::SaveNote, json!({"text": "hi"}));
    let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
    assert_eq!(value["type"], "execute");
    assert_eq!(value["request_id"], 7);
    assert_eq!(value["idempotency_key"], "abc");
    assert_eq!(value["kind"], "save_note");
    assert_eq!(value["payload"]["text"], "hi");
}

#[test]
fn server_result_parses_from_json() {
    let msg = ServerMessage::from_json(
        r#"{"type":"execute_result","request_id":3,"outcome":{"status":"failed","code":"unavailable","message":"backend down"}}"#,
    )
    .unwrap();
    let ServerMessage::ExecuteResult { request_id, outcome } = msg else {
        unreachable!("expected execute_result");
    };
    assert_eq!(request_id, 3);
    let failure = outcome.into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::Network);
    assert!(failure.is_retriable());
}

#[test]
fn ok_outcome_is_success() {
    assert!(ExecuteOutcome::Ok.into_result().is_ok());
}

#[test]
fn explicit_kind_overrides_code() {
    let outcome = ExecuteOutcome::Failed {
        code: Some("unavailable".into()),
        kind: Some(FailureKind::Quota),
        message: "throttled".into(),
        retriable: true,
    };
    assert_eq!(outcome.into_result().unwrap_err().kind, FailureKind::Quota);
}

#[test]
fn non_retriable_outcome_is_permanent() {
    let outcome = ExecuteOutcome::Failed {
        code: Some("unavailable".into()),
        kind: None,
        message: "gone for good".into(),
        retriable: false,
    };
    assert!(!outcome.into_result().unwrap_err().is_retriable());
}

#[test]
fn failed_without_code_classifies_message() {
    let outcome = ExecuteOutcome::Failed {
        code: None,
        kind: None,
        message: "permission denied for document".into(),
        retriable: true,
    };
    assert_eq!(outcome.into_result().unwrap_err().kind, FailureKind::Auth);
}

#[test]
fn notice_parses_from_json() {
    let msg = ServerMessage::from_json(r#"{"type":"notice","message":"maintenance at 02:00"}"#)
        .unwrap();
    assert_eq!(msg, ServerMessage::notice("maintenance at 02:00"));
}

#[test]
fn unknown_frame_type_is_rejected() {
    assert!(ServerMessage::from_json(r#"{"type":"pong","id":1}"#).is_err());
}
