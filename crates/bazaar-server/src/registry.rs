//! Connection registry: who is connected, which address each connection
//! speaks for, and what each address is called.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bazaar_core::{friendly_name, introduced_name, ConnectionId, HubError, Role};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{Connection, Outbound};

/// Result of binding an address to a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// The connection had no address; it now speaks for this one.
    Bound {
        /// No connection had ever bound this address before.
        first_sighting: bool,
    },
    /// Already bound to the same address.
    Unchanged,
    /// Already bound to a different address, which stays in place.
    Mismatch { bound: String },
    /// No such connection.
    Unknown,
}

/// One row of the participant roster.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub address: String,
    pub name: String,
    pub connections: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
}

/// Owned by the hub loop. Iteration order is connection arrival order.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<ConnectionId, Connection>,
    hinted_names: HashMap<String, String>,
    introduced_names: HashMap<String, String>,
    balances: HashMap<String, f64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: ConnectionId,
        role: Role,
        name_hint: Option<String>,
        tx: mpsc::Sender<Outbound>,
    ) -> &mut Connection {
        info!(conn_id = %id, %role, name_hint = name_hint.as_deref().unwrap_or(""), "connection registered");
        self.connections
            .entry(id.clone())
            .or_insert_with(|| Connection::new(id, role, name_hint, tx))
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    pub fn role_of(&self, id: &ConnectionId) -> Option<Role> {
        self.connections.get(id).map(|c| c.role)
    }

    /// Bind `address` to the connection if it has none yet. The first address
    /// a connection claims is the one it keeps.
    pub fn bind_identity(&mut self, id: &ConnectionId, address: &str) -> Binding {
        let first_sighting = !self.is_known_address(address);
        let Some(conn) = self.connections.get_mut(id) else {
            return Binding::Unknown;
        };
        match conn.address() {
            Some(bound) if bound == address => Binding::Unchanged,
            Some(bound) => Binding::Mismatch {
                bound: bound.to_string(),
            },
            None => {
                let _ = conn.bind_address(address);
                if let Some(hint) = conn.name_hint() {
                    let _ = self
                        .hinted_names
                        .entry(address.to_string())
                        .or_insert_with(|| hint.to_string());
                }
                debug!(conn_id = %id, address, first_sighting, "identity bound");
                Binding::Bound { first_sighting }
            }
        }
    }

    fn is_known_address(&self, address: &str) -> bool {
        self.hinted_names.contains_key(address)
            || self.introduced_names.contains_key(address)
            || self.balances.contains_key(address)
            || self
                .connections
                .values()
                .any(|c| c.address() == Some(address))
    }

    /// Adopt a self-introduced name ("I'm Alice") for `address` unless one was
    /// already adopted. Returns the newly adopted name.
    pub fn adopt_introduction(&mut self, address: &str, text: &str) -> Option<String> {
        if self.introduced_names.contains_key(address) {
            return None;
        }
        let name = introduced_name(text)?;
        debug!(address, name = %name, "adopted introduced name");
        let _ = self
            .introduced_names
            .insert(address.to_string(), name.clone());
        Some(name)
    }

    /// Display name for an address: connect-time hint, then self-introduction,
    /// then the deterministic friendly name.
    pub fn resolve_name(&self, address: &str) -> String {
        self.hinted_names
            .get(address)
            .or_else(|| self.introduced_names.get(address))
            .cloned()
            .unwrap_or_else(|| friendly_name(address))
    }

    pub fn record_balance(&mut self, address: &str, balance: f64) {
        let _ = self.balances.insert(address.to_string(), balance);
    }

    pub fn balance_of(&self, address: &str) -> Option<f64> {
        self.balances.get(address).copied()
    }

    /// Record inbound activity from a connection.
    pub fn touch(&mut self, id: &ConnectionId) {
        if let Some(conn) = self.connections.get_mut(id) {
            conn.mark_alive();
        }
    }

    /// Remove a connection and ask its writer to close the socket.
    pub fn evict(&mut self, id: &ConnectionId) -> Option<Connection> {
        let mut conn = self.connections.remove(id)?;
        let _ = conn.send(Outbound::Close);
        info!(conn_id = %id, address = conn.address().unwrap_or(""), age_secs = conn.age().as_secs(), "connection removed");
        Some(conn)
    }

    /// Evict every connection; used when the hub stops.
    pub fn close_all(&mut self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.keys().cloned().collect();
        for id in &ids {
            let _ = self.evict(id);
        }
        ids.len()
    }

    /// One liveness round: connections that stayed silent since the last
    /// round are evicted, the rest are pinged and must answer before the next.
    pub fn sweep_liveness(&mut self) -> Vec<ConnectionId> {
        let mut dead = Vec::new();
        for (id, conn) in &mut self.connections {
            if conn.check_alive() {
                let _ = conn.send(Outbound::Ping);
            } else {
                dead.push(id.clone());
            }
        }
        for id in &dead {
            let error = HubError::ConnectionFailure("no heartbeat since last sweep".into());
            warn!(conn_id = %id, error_kind = error.error_kind(), error = %error, "evicting");
            let _ = self.evict(id);
        }
        dead
    }

    /// Queue a pre-encoded text frame for every connection accepted by
    /// `filter`. Returns how many queues accepted it.
    pub fn send_where<F>(&mut self, text: &Arc<String>, mut filter: F) -> usize
    where
        F: FnMut(&Connection) -> bool,
    {
        self.connections
            .values_mut()
            .filter(|c| filter(c))
            .map(|c| c.send_text(Arc::clone(text)))
            .filter(|sent| *sent)
            .count()
    }

    pub fn send_to(&mut self, id: &ConnectionId, text: &Arc<String>) -> bool {
        self.connections
            .get_mut(id)
            .is_some_and(|c| c.send_text(Arc::clone(text)))
    }

    /// Participant addresses with at least one live connection, by address.
    pub fn roster(&self) -> Vec<RosterEntry> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for conn in self.connections.values() {
            if conn.role != Role::Participant {
                continue;
            }
            if let Some(address) = conn.address() {
                *counts.entry(address).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(address, connections)| RosterEntry {
                address: address.to_string(),
                name: self.resolve_name(address),
                connections,
                balance: self.balance_of(address),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.connections.values().filter(|c| c.role == role).count()
    }

    /// Messages dropped on full or closed queues, summed over live connections.
    pub fn dropped_messages(&self) -> u64 {
        self.connections.values().map(Connection::drop_count).sum()
    }
}
