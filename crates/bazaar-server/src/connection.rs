//! Per-connection state held by the hub loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bazaar_core::{ConnectionId, Role};
use tokio::sync::mpsc;
use tracing::warn;

/// What the hub asks a connection's writer task to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text frame.
    Text(Arc<String>),
    /// Send a liveness probe.
    Ping,
    /// Close the socket.
    Close,
}

/// A live hub connection. Owned by the registry; never shared across tasks.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub role: Role,
    address: Option<String>,
    name_hint: Option<String>,
    alive: bool,
    connected_at: Instant,
    dropped_messages: u64,
    tx: mpsc::Sender<Outbound>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        role: Role,
        name_hint: Option<String>,
        tx: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            id,
            role,
            address: None,
            name_hint,
            alive: true,
            connected_at: Instant::now(),
            dropped_messages: 0,
            tx,
        }
    }

    /// The address this connection speaks for, once bound.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn name_hint(&self) -> Option<&str> {
        self.name_hint.as_deref()
    }

    /// Bind the address if none is bound yet. Returns `true` if this call
    /// performed the binding.
    pub fn bind_address(&mut self, address: &str) -> bool {
        if self.address.is_some() {
            return false;
        }
        self.address = Some(address.to_string());
        true
    }

    /// Queue a message without waiting. A full or closed queue drops the
    /// message and returns `false`.
    pub fn send(&mut self, message: Outbound) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_messages += 1;
                warn!(conn_id = %self.id, dropped = self.dropped_messages, "send queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped_messages += 1;
                false
            }
        }
    }

    pub fn send_text(&mut self, text: Arc<String>) -> bool {
        self.send(Outbound::Text(text))
    }

    /// Record inbound activity (a frame or a pong).
    pub fn mark_alive(&mut self) {
        self.alive = true;
    }

    /// Check and reset the alive flag for the next sweep.
    pub fn check_alive(&mut self) -> bool {
        std::mem::replace(&mut self.alive, false)
    }

    pub fn drop_count(&self) -> u64 {
        self.dropped_messages
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
