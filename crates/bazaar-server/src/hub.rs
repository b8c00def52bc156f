//! The hub event loop.
//!
//! A single task owns the [`ConnectionRegistry`] and the [`Ledger`] and
//! applies [`HubCommand`]s one at a time. Socket tasks, timers, background
//! balance lookups and HTTP handlers all talk to it through a [`HubHandle`],
//! so no hub state is ever shared or locked.

use std::sync::Arc;
use std::time::Instant;

use bazaar_core::{Accept, Chat, ConnectionId, Frame, HubError, Offer, Pay, Role};
use bazaar_ledger::{InvoiceRecord, Ledger, ResetSummary, TransactionRecord};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::balance::BalanceSource;
use crate::connection::Outbound;
use crate::fanout;
use crate::registry::{Binding, ConnectionRegistry, RosterEntry};
use crate::router;

/// Everything the hub loop reacts to.
#[derive(Debug)]
pub enum HubCommand {
    /// A socket finished its upgrade.
    Connect {
        id: ConnectionId,
        role: Role,
        name_hint: Option<String>,
        outbound: mpsc::Sender<Outbound>,
    },
    /// A text frame arrived on a socket.
    Inbound { id: ConnectionId, text: String },
    /// A pong (or other keep-alive traffic) arrived on a socket.
    Activity { id: ConnectionId },
    /// A socket closed or errored.
    Disconnect { id: ConnectionId, reason: String },
    HeartbeatSweep,
    ExpirySweep,
    /// A background balance lookup finished.
    BalanceResolved { address: String, balance: f64 },
    Roster { reply: oneshot::Sender<Vec<RosterEntry>> },
    Transactions { reply: oneshot::Sender<Vec<TransactionRecord>> },
    Market { reply: oneshot::Sender<MarketSnapshot> },
    Stats { reply: oneshot::Sender<HubStats> },
    Reset { reply: oneshot::Sender<ResetSummary> },
}

/// Open offers and unpaid invoices.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub offers: Vec<Offer>,
    pub invoices: Vec<InvoiceRecord>,
}

/// Point-in-time counters for the health endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub connections: usize,
    pub participants: usize,
    pub observers: usize,
    pub open_offers: usize,
    pub pending_invoices: usize,
    pub transactions: usize,
    pub dropped_messages: u64,
    pub uptime_secs: u64,
}

/// Cloneable sender side of the hub loop.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

/// Create the command channel for a hub loop.
pub fn channel(capacity: usize) -> (HubHandle, mpsc::Receiver<HubCommand>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (HubHandle { tx }, rx)
}

impl HubHandle {
    pub async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| HubError::Unavailable)
    }

    pub async fn connect(
        &self,
        id: ConnectionId,
        role: Role,
        name_hint: Option<String>,
        outbound: mpsc::Sender<Outbound>,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Connect {
            id,
            role,
            name_hint,
            outbound,
        })
        .await
    }

    pub async fn inbound(&self, id: ConnectionId, text: String) -> Result<(), HubError> {
        self.send(HubCommand::Inbound { id, text }).await
    }

    pub async fn activity(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Activity { id }).await
    }

    pub async fn disconnect(&self, id: ConnectionId, reason: impl Into<String>) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect {
            id,
            reason: reason.into(),
        })
        .await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HubCommand,
    ) -> Result<T, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    pub async fn roster(&self) -> Result<Vec<RosterEntry>, HubError> {
        self.request(|reply| HubCommand::Roster { reply }).await
    }

    pub async fn transactions(&self) -> Result<Vec<TransactionRecord>, HubError> {
        self.request(|reply| HubCommand::Transactions { reply }).await
    }

    pub async fn market(&self) -> Result<MarketSnapshot, HubError> {
        self.request(|reply| HubCommand::Market { reply }).await
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        self.request(|reply| HubCommand::Stats { reply }).await
    }

    pub async fn reset(&self) -> Result<ResetSummary, HubError> {
        self.request(|reply| HubCommand::Reset { reply }).await
    }
}

/// Hub state. Only ever touched from the loop task.
pub struct Hub {
    registry: ConnectionRegistry,
    ledger: Ledger,
    balances: Option<Arc<dyn BalanceSource>>,
    handle: HubHandle,
    started_at: Instant,
}

impl Hub {
    /// `handle` must feed the receiver this hub will be run with; balance
    /// results re-enter the loop through it.
    pub fn new(ledger: Ledger, balances: Option<Arc<dyn BalanceSource>>, handle: HubHandle) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            ledger,
            balances,
            handle,
            started_at: Instant::now(),
        }
    }

    /// Create a hub with its command channel and run it on a new task.
    pub fn spawn(
        ledger: Ledger,
        balances: Option<Arc<dyn BalanceSource>>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (HubHandle, JoinHandle<()>) {
        let (handle, rx) = channel(capacity);
        let hub = Self::new(ledger, balances, handle.clone());
        let task = tokio::spawn(hub.run(rx, cancel));
        (handle, task)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Drain commands until cancelled, then close every connection.
    pub async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>, cancel: CancellationToken) {
        info!("hub loop started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
            }
        }
        let closed = self.registry.close_all();
        info!(closed, "hub loop stopped");
    }

    /// Apply one command. Never blocks.
    pub fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect {
                id,
                role,
                name_hint,
                outbound,
            } => {
                let _ = self.registry.register(id.clone(), role, name_hint, outbound);
                let _ = fanout::welcome(&mut self.registry, &id, role);
            }
            HubCommand::Inbound { id, text } => self.handle_inbound(&id, &text),
            HubCommand::Activity { id } => self.registry.touch(&id),
            HubCommand::Disconnect { id, reason } => {
                if self.registry.evict(&id).is_some() {
                    debug!(conn_id = %id, reason = %reason, "disconnected");
                }
            }
            HubCommand::HeartbeatSweep => {
                let evicted = self.registry.sweep_liveness();
                debug!(evicted = evicted.len(), live = self.registry.len(), "heartbeat sweep");
            }
            HubCommand::ExpirySweep => {
                let expired = self.ledger.sweep_expired(Utc::now());
                if !expired.is_empty() {
                    info!(count = expired.len(), "expired unpaid invoices");
                }
            }
            HubCommand::BalanceResolved { address, balance } => {
                self.registry.record_balance(&address, balance);
            }
            HubCommand::Roster { reply } => {
                let _ = reply.send(self.registry.roster());
            }
            HubCommand::Transactions { reply } => {
                let _ = reply.send(self.ledger.transactions().to_vec());
            }
            HubCommand::Market { reply } => {
                let _ = reply.send(self.market());
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            HubCommand::Reset { reply } => {
                let summary = self.ledger.reset();
                info!(
                    offers = summary.offers,
                    invoices = summary.invoices,
                    transactions = summary.transactions,
                    "market reset"
                );
                let _ = fanout::announce(&mut self.registry, fanout::RESET_NOTICE);
                let _ = reply.send(summary);
            }
        }
    }

    fn handle_inbound(&mut self, id: &ConnectionId, text: &str) {
        self.registry.touch(id);
        let Some(role) = self.registry.role_of(id) else {
            debug!(conn_id = %id, "frame from unknown connection dropped");
            return;
        };

        let frame = match router::admit(role, text) {
            Ok(frame) => frame,
            Err(e) if e.is_reported_to_sender() => {
                warn!(conn_id = %id, error_kind = e.error_kind(), error = %e, "frame refused");
                let _ = fanout::notify(&mut self.registry, id, e.to_string());
                return;
            }
            Err(e) => {
                warn!(conn_id = %id, error_kind = e.error_kind(), error = %e, "frame dropped");
                return;
            }
        };

        self.bind_sender(id, frame.from_address());

        match frame {
            Frame::Offer(offer) => self.handle_offer(id, offer),
            Frame::Accept(accept) => self.handle_accept(id, accept),
            Frame::Pay(pay) => self.handle_pay(id, pay),
            Frame::Chat(chat) => self.handle_chat(id, chat),
            Frame::Invoice(_) => {}
        }
    }

    /// Record the sender's address for routing and naming. This is not an
    /// authorization check: a frame whose `from` differs from the bound address
    /// is still processed under its own `from`.
    fn bind_sender(&mut self, id: &ConnectionId, address: &str) {
        match self.registry.bind_identity(id, address) {
            Binding::Bound {
                first_sighting: true,
            } => self.request_balance(address),
            Binding::Mismatch { bound } => {
                warn!(conn_id = %id, bound = %bound, claimed = address, "frame sender differs from bound address");
            }
            _ => {}
        }
    }

    fn handle_offer(&mut self, id: &ConnectionId, offer: Offer) {
        match self.ledger.submit_offer(offer) {
            Ok(offer) => {
                let line = fanout::narrate_offer(&self.registry, &offer);
                let _ = fanout::broadcast(&mut self.registry, Some(id), &Frame::Offer(offer));
                let _ = fanout::announce(&mut self.registry, line);
            }
            Err(rejection) => reject(id, &rejection),
        }
    }

    fn handle_accept(&mut self, id: &ConnectionId, accept: Accept) {
        match self.ledger.accept(&accept, Utc::now()) {
            Ok(invoice) => {
                let _ = fanout::broadcast(&mut self.registry, Some(id), &Frame::Accept(accept));
                fanout::deliver_invoice(&mut self.registry, &invoice);
                let line = fanout::narrate_accept(&self.registry, &invoice);
                let _ = fanout::announce(&mut self.registry, line);
            }
            Err(rejection) => reject(id, &rejection),
        }
    }

    fn handle_pay(&mut self, id: &ConnectionId, pay: Pay) {
        match self.ledger.pay(&pay, Utc::now()) {
            Ok(record) => {
                info!(
                    offer_id = %record.offer_id,
                    tx_id = %record.id,
                    amount = record.amount,
                    "deal settled"
                );
                let _ = fanout::broadcast(&mut self.registry, Some(id), &Frame::Pay(pay));
                let line = fanout::narrate_payment(&self.registry, &record);
                let _ = fanout::announce(&mut self.registry, line);
                self.request_balance(&record.from);
                self.request_balance(&record.to);
            }
            Err(rejection) => reject(id, &rejection),
        }
    }

    fn handle_chat(&mut self, id: &ConnectionId, chat: Chat) {
        if let Some(name) = self.registry.adopt_introduction(&chat.from, &chat.text) {
            info!(address = %chat.from, name = %name, "participant introduced themselves");
        }
        let _ = fanout::broadcast(&mut self.registry, Some(id), &Frame::Chat(chat));
    }

    /// Look up a balance off-loop; the result comes back as a command.
    fn request_balance(&self, address: &str) {
        let Some(source) = self.balances.clone() else {
            return;
        };
        let handle = self.handle.clone();
        let address = address.to_string();
        drop(tokio::spawn(async move {
            match source.balance_of(&address).await {
                Ok(balance) => {
                    let _ = handle
                        .send(HubCommand::BalanceResolved { address, balance })
                        .await;
                }
                Err(e) => warn!(address = %address, error = %e, "balance lookup failed"),
            }
        }));
    }

    fn market(&self) -> MarketSnapshot {
        MarketSnapshot {
            offers: self.ledger.open_offers().into_iter().cloned().collect(),
            invoices: self.ledger.pending_invoices().into_iter().cloned().collect(),
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.registry.len(),
            participants: self.registry.count_role(Role::Participant),
            observers: self.registry.count_role(Role::Observer),
            open_offers: self.ledger.open_offers().len(),
            pending_invoices: self.ledger.pending_invoices().len(),
            transactions: self.ledger.transactions().len(),
            dropped_messages: self.registry.dropped_messages(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

fn reject(id: &ConnectionId, rejection: &bazaar_ledger::Rejection) {
    let error = HubError::ValidationFailure(rejection.to_string());
    warn!(
        conn_id = %id,
        error_kind = error.error_kind(),
        reason = rejection.reason(),
        error = %error,
        "frame rejected by ledger"
    );
}
