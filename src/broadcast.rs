//! Broadcast layer - fan-out of state changes to connected clients
//!
//! Keeps a registry of live client handles and pushes every committed
//! mutation to all of them. Fan-out is fire-and-forget: messages are
//! idempotent state overwrites, so a client that misses one meter tick gets
//! current values with the next one. The registry is an explicit injected
//! object (no ambient statics) so it can be exercised with fake handles.

use crate::state::{AppState, AuxBusState, ChannelState, ConnectionStatus};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// One connected observer's transport handle
pub trait ClientSink: Send + Sync {
    /// Queue a serialized message; returns false when the transport is gone
    fn send_text(&self, text: &str) -> bool;
    /// Whether the transport still reports an open/ready state
    fn is_open(&self) -> bool;
}

/// Notification pushed to clients, discriminated by `type`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Full snapshot, sent first on every new connection
    State(AppState),
    /// Single channel changed
    Channel(ChannelState),
    /// Lightweight high-frequency meter update
    #[serde(rename_all = "camelCase")]
    Meter {
        id: u16,
        #[serde(skip_serializing_if = "Option::is_none")]
        meter_pre: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        meter_post_fader: Option<f64>,
    },
    /// Aux bus renamed
    Aux(AuxBusState),
    /// Hardware link status changed
    #[serde(rename_all = "camelCase")]
    Status { connection_status: ConnectionStatus },
}

struct RegistryInner {
    clients: Mutex<HashMap<u64, Arc<dyn ClientSink>>>,
    next_id: AtomicU64,
}

/// Registry of live client connections
///
/// Created once per server process; cheap to clone and share across tasks.
#[derive(Clone)]
pub struct ClientRegistry {
    inner: Arc<RegistryInner>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                clients: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a client handle, returning its id for later removal
    pub fn add(&self, sink: Arc<dyn ClientSink>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.clients.lock().insert(id, sink);
        debug!("Client {id} registered ({} connected)", self.len());
        id
    }

    /// Deregister a client, normally from its close callback
    pub fn remove(&self, id: u64) {
        self.inner.clients.lock().remove(&id);
        debug!("Client {id} removed ({} connected)", self.len());
    }

    pub fn len(&self) -> usize {
        self.inner.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize once and send to every open client
    ///
    /// Clients whose transport is not open are skipped, not removed; removal
    /// happens via the close path. Returns the number of clients reached.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let text = match serde_json::to_string(message) {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to serialize broadcast message: {e}");
                return 0;
            }
        };

        let clients = self.inner.clients.lock();
        let mut delivered = 0;
        for sink in clients.values() {
            if sink.is_open() && sink.send_text(&text) {
                delivered += 1;
            }
        }
        delivered
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::ClientSink;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory sink recording everything sent to it
    #[derive(Default)]
    pub struct FakeSink {
        pub open: AtomicBool,
        pub sent: Mutex<Vec<String>>,
    }

    impl FakeSink {
        pub fn open() -> Self {
            Self { open: AtomicBool::new(true), sent: Mutex::new(Vec::new()) }
        }

        pub fn close(&self) {
            self.open.store(false, Ordering::SeqCst);
        }

        pub fn messages(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    impl ClientSink for FakeSink {
        fn send_text(&self, text: &str) -> bool {
            self.sent.lock().push(text.to_string());
            true
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }
}
