// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote sync executor.
//!
//! The queue hands each ready operation to a [`RemoteExecutor`], which performs
//! the remote effect and reports success or a classified [`SyncFailure`].
//! [`TransportExecutor`] is the concrete executor speaking the JSON protocol
//! over a [`Transport`], normally a [`WebSocketTransport`].

mod transport;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use offsync_core::protocol::{ClientMessage, ServerMessage};
use offsync_core::{classify_message, OperationId, OperationKind, QueuedOperation, SyncFailure};
use tracing::{debug, warn};

pub use transport::{
    Transport, TransportError, TransportFuture, TransportResult, WebSocketTransport,
};

/// Everything an executor needs to perform one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    pub operation_id: OperationId,
    /// Identical for every attempt of the same operation.
    pub idempotency_key: String,
    pub kind: OperationKind,
    pub payload: serde_json::Value,
}

impl From<&QueuedOperation> for ExecuteRequest {
    fn from(op: &QueuedOperation) -> Self {
        ExecuteRequest {
            operation_id: op.id.clone(),
            idempotency_key: op.id.idempotency_key(),
            kind: op.kind,
            payload: op.payload.clone(),
        }
    }
}

/// Boxed future returned by [`RemoteExecutor::execute`].
pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SyncFailure>> + Send + 'a>>;

/// Performs the remote effect of a queued operation.
pub trait RemoteExecutor: Send + Sync {
    fn execute(&self, request: ExecuteRequest) -> ExecuteFuture<'_>;
}

/// Executor that sends each request over a [`Transport`] and waits for the
/// matching result.
///
/// Connects lazily on first use and reconnects after any transport error.
/// Requests are serialized over the single connection.
pub struct TransportExecutor<T: Transport> {
    url: String,
    transport: tokio::sync::Mutex<T>,
    next_request_id: AtomicU64,
    response_timeout: Duration,
}

impl TransportExecutor<WebSocketTransport> {
    /// Creates an executor that talks to a WebSocket server at `url`.
    pub fn websocket(url: impl Into<String>, response_timeout: Duration) -> Self {
        Self::with_transport(url, WebSocketTransport::new(), response_timeout)
    }
}

impl<T: Transport> TransportExecutor<T> {
    pub fn with_transport(url: impl Into<String>, transport: T, response_timeout: Duration) -> Self {
        TransportExecutor {
            url: url.into(),
            transport: tokio::sync::Mutex::new(transport),
            next_request_id: AtomicU64::new(1),
            response_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn round_trip(&self, request: ExecuteRequest) -> Result<(), SyncFailure> {
        let mut transport = self.transport.lock().await;

        if !transport.is_connected() {
            transport
                .connect(&self.url)
                .await
                .map_err(|e| SyncFailure::network(e.to_string()))?;
            debug!(url = %self.url, "executor connected");
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let msg = ClientMessage::execute(
            request_id,
            request.idempotency_key,
            request.kind,
            request.payload,
        );
        if let Err(e) = transport.send(msg).await {
            return Err(transport_failure(e));
        }

        let wait = async {
            loop {
                match transport.recv().await {
                    Ok(Some(ServerMessage::ExecuteResult { request_id: id, outcome }))
                        if id == request_id =>
                    {
                        return outcome.into_result();
                    }
                    Ok(Some(ServerMessage::ExecuteResult { request_id: id, .. })) => {
                        // Late answer to a request we already gave up on
                        debug!(stale = id, expected = request_id, "ignoring stale execute result");
                    }
                    Ok(Some(ServerMessage::Notice { message })) => {
                        debug!(%message, "server notice");
                    }
                    Ok(Some(ServerMessage::Error { message })) => {
                        let kind = classify_message(&message);
                        return Err(SyncFailure::new(kind, message));
                    }
                    Ok(None) => {
                        return Err(SyncFailure::network("connection closed by server"));
                    }
                    Err(e) => return Err(transport_failure(e)),
                }
            }
        };

        let outcome = tokio::time::timeout(self.response_timeout, wait).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(request_id, "no response from server; dropping connection");
                let _ = transport.disconnect().await;
                Err(SyncFailure::network(format!(
                    "no response within {}ms",
                    self.response_timeout.as_millis()
                )))
            }
        }
    }
}

fn transport_failure(err: TransportError) -> SyncFailure {
    match err {
        TransportError::Malformed(message) => SyncFailure::unknown(message),
        other => SyncFailure::network(other.to_string()),
    }
}

impl<T: Transport + 'static> RemoteExecutor for TransportExecutor<T> {
    fn execute(&self, request: ExecuteRequest) -> ExecuteFuture<'_> {
        Box::pin(self.round_trip(request))
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
