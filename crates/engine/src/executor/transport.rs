// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Message transport under the executor.
//!
//! [`TransportExecutor`](super::TransportExecutor) only needs to open a
//! connection, exchange protocol messages, and forget the connection after a
//! failure. [`WebSocketTransport`] does this over tokio-tungstenite; tests
//! substitute an in-memory transport.

use std::future::Future;
use std::pin::Pin;

use futures_util::{SinkExt, StreamExt};
use offsync_core::protocol::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::trace;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("not connected")]
    NotConnected,

    #[error("write failed: {0}")]
    Write(String),

    #[error("read failed: {0}")]
    Read(String),

    /// The peer sent something that is not a protocol message.
    #[error("malformed message: {0}")]
    Malformed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// A bidirectional, message-oriented connection to the sync server.
///
/// After any read or write error the transport reports itself disconnected;
/// the executor reconnects before its next request.
pub trait Transport: Send + Sync {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()>;

    /// Drops the connection. Calling it while disconnected is a no-op.
    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()>;

    /// Next protocol message, or `None` once the server has closed the
    /// connection.
    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>>;

    fn is_connected(&self) -> bool;
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`Transport`] over one tokio-tungstenite WebSocket.
///
/// Control frames are handled by tungstenite; text and binary frames must
/// carry a JSON [`ServerMessage`].
#[derive(Default)]
pub struct WebSocketTransport {
    socket: Option<Socket>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode(payload: &[u8]) -> TransportResult<ServerMessage> {
    let text =
        std::str::from_utf8(payload).map_err(|e| TransportError::Malformed(e.to_string()))?;
    ServerMessage::from_json(text).map_err(|e| TransportError::Malformed(e.to_string()))
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((socket, _response)) => {
                    self.socket = Some(socket);
                    Ok(())
                }
                Err(e) => Err(TransportError::Unreachable { url, reason: e.to_string() }),
            }
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if let Some(mut socket) = self.socket.take() {
                // The peer may already be gone
                let _ = socket.close(None).await;
            }
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let json = msg.to_json().map_err(|e| TransportError::Malformed(e.to_string()))?;
            let socket = self.socket.as_mut().ok_or(TransportError::NotConnected)?;
            let written = socket.send(Message::Text(json.into())).await;
            if let Err(e) = written {
                self.socket = None;
                return Err(TransportError::Write(e.to_string()));
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            loop {
                let socket = self.socket.as_mut().ok_or(TransportError::NotConnected)?;
                let next = socket.next().await;
                let frame = match next {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        self.socket = None;
                        return Err(TransportError::Read(e.to_string()));
                    }
                    None => {
                        self.socket = None;
                        return Ok(None);
                    }
                };

                match frame {
                    Message::Text(text) => return decode(text.as_bytes()).map(Some),
                    Message::Binary(data) => return decode(&data).map(Some),
                    Message::Close(reason) => {
                        trace!(?reason, "server closed the connection");
                        self.socket = None;
                        return Ok(None);
                    }
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}
