// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use futures_util::{SinkExt, StreamExt};
use offsync_core::protocol::{ClientMessage, ExecuteOutcome, ServerMessage};
use tokio_tungstenite::tungstenite::Message;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `offsync` pinned to `state`, isolated from the caller's environment.
pub fn offsync(state: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("offsync");
    cmd.env_remove("OFFSYNC_STATE_DIR")
        .env_remove("OFFSYNC_CONFIG")
        .env_remove("OFFSYNC_LOG")
        .arg("--state-dir")
        .arg(state.path());
    cmd
}

pub fn write_config(state: &TempDir, content: &str) {
    std::fs::write(state.path().join("config.toml"), content).unwrap();
}

/// Enqueues an operation and returns its id.
pub fn enqueue(state: &TempDir, kind: &str, payload: &str) -> String {
    let output = offsync(state)
        .args(["enqueue", kind, payload])
        .output()
        .unwrap();
    assert!(output.status.success(), "enqueue failed: {:?}", output);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// WebSocket server answering every execute request with one fixed outcome.
pub struct FakeRemote {
    pub url: String,
    pub received: Arc<Mutex<Vec<ClientMessage>>>,
}

impl FakeRemote {
    pub fn spawn(outcome: ExecuteOutcome) -> Self {
        let (addr_tx, addr_rx) = std::sync::mpsc::channel::<SocketAddr>();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();
                while let Ok((stream, _)) = listener.accept().await {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        continue;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        let Message::Text(text) = msg else { continue };
                        let Ok(request) = ClientMessage::from_json(&text) else { continue };
                        let ClientMessage::Execute { request_id, .. } = &request;
                        let reply = ServerMessage::ExecuteResult {
                            request_id: *request_id,
                            outcome: outcome.clone(),
                        };
                        log.lock().unwrap().push(request);
                        let json = reply.to_json().unwrap();
                        if ws.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            });
        });

        let addr = addr_rx.recv().unwrap();
        FakeRemote { url: format!("ws://{}", addr), received }
    }

    pub fn request_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn idempotency_keys(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|ClientMessage::Execute { idempotency_key, .. }| idempotency_key.clone())
            .collect()
    }

    pub fn config(&self) -> String {
        format!("[remote]\nurl = \"{}\"\nresponse_timeout_ms = 2000\n", self.url)
    }
}
