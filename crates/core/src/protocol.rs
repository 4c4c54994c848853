// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format for pushing queued operations to the sync server.
//!
//! Every attempt is one `execute` frame carrying the operation's idempotency
//! key; the server answers with an `execute_result` echoing `request_id`.
//! Frames are JSON objects tagged by `type`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::failure::{classify_code, classify_message, FailureKind, SyncFailure};
use crate::operation::OperationKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Execute {
        /// Echoed back in the matching result.
        request_id: u64,
        /// Same for every attempt of one operation.
        idempotency_key: String,
        kind: OperationKind,
        payload: serde_json::Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ExecuteResult { request_id: u64, outcome: ExecuteOutcome },

    /// Informational; does not answer any request.
    Notice { message: String },

    /// Connection-level failure, not tied to a request.
    Error { message: String },
}

/// Server verdict on one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecuteOutcome {
    Ok,
    Failed {
        /// Backend status code, e.g. `permission-denied`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Takes precedence over `code`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<FailureKind>,
        message: String,
        #[serde(default = "retriable_by_default")]
        retriable: bool,
    },
}

fn retriable_by_default() -> bool {
    true
}

impl ExecuteOutcome {
    pub fn into_result(self) -> Result<(), SyncFailure> {
        let ExecuteOutcome::Failed { code, kind, message, retriable } = self else {
            return Ok(());
        };
        let kind = kind.unwrap_or_else(|| match code.as_deref() {
            Some(code) => classify_code(code, &message),
            None => classify_message(&message),
        });
        let failure = SyncFailure::new(kind, message);
        Err(if retriable { failure } else { failure.permanent() })
    }
}

fn encode<T: Serialize>(frame: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(text)
}

impl ClientMessage {
    pub fn execute(
        request_id: u64,
        idempotency_key: impl Into<String>,
        kind: OperationKind,
        payload: serde_json::Value,
    ) -> Self {
        ClientMessage::Execute { request_id, idempotency_key: idempotency_key.into(), kind, payload }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        encode(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        decode(text)
    }
}

impl ServerMessage {
    pub fn execute_ok(request_id: u64) -> Self {
        ServerMessage::ExecuteResult { request_id, outcome: ExecuteOutcome::Ok }
    }

    /// A retriable failure classified from a backend status code.
    pub fn execute_failed(
        request_id: u64,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let outcome = ExecuteOutcome::Failed {
            code: Some(code.into()),
            kind: None,
            message: message.into(),
            retriable: true,
        };
        ServerMessage::ExecuteResult { request_id, outcome }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        ServerMessage::Notice { message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        encode(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        decode(text)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
