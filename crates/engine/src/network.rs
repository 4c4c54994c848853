// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network monitor adapter.
//!
//! The engine never probes connectivity itself. The host platform reports
//! state changes through a [`NetworkMonitor`]; [`ManualNetworkMonitor`] is the
//! in-process implementation hosts feed their platform callbacks into.

use std::sync::Mutex;

use offsync_core::NetworkState;
use tracing::debug;

use crate::listeners::{ListenerRegistry, Subscription};

/// Source of connectivity state and change notifications.
pub trait NetworkMonitor: Send + Sync {
    fn current_state(&self) -> NetworkState;

    /// Registers a callback invoked on every reported state.
    fn on_change(&self, listener: Box<dyn Fn(&NetworkState) + Send + Sync>) -> Subscription;
}

/// Monitor whose state is pushed in by the host.
pub struct ManualNetworkMonitor {
    state: Mutex<NetworkState>,
    listeners: ListenerRegistry<NetworkState>,
}

impl ManualNetworkMonitor {
    pub fn new(initial: NetworkState) -> Self {
        ManualNetworkMonitor {
            state: Mutex::new(initial),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Records a platform report and notifies listeners.
    ///
    /// Platforms may repeat the same state; listeners are notified regardless.
    pub fn set_state(&self, state: NetworkState) {
        {
            let mut current = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *current != state {
                debug!(
                    from = %current.connection_status(),
                    to = %state.connection_status(),
                    "network state changed"
                );
            }
            *current = state;
        }
        self.listeners.emit(&state);
    }

    pub fn go_online(&self) {
        self.set_state(NetworkState::online());
    }

    pub fn go_offline(&self) {
        self.set_state(NetworkState::offline());
    }
}

impl Default for ManualNetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkState::offline())
    }
}

impl NetworkMonitor for ManualNetworkMonitor {
    fn current_state(&self) -> NetworkState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn on_change(&self, listener: Box<dyn Fn(&NetworkState) + Send + Sync>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
