//! # bazaar-server
//!
//! Real-time negotiation hub.
//!
//! - WebSocket gateway at `/ws?role=..&name=..`
//! - A single event loop ([`hub::Hub`]) owns the connection registry and the
//!   negotiation ledger; every inbound frame, timer tick and background result
//!   is applied there, one at a time
//! - Audience-aware fanout with per-connection bounded queues
//! - Liveness and invoice-expiry sweeps on independent timers
//! - Read-only HTTP side-channel for dashboards (`/roster`, `/transactions`,
//!   `/offers`, `/health`) plus `POST /reset`

#![deny(unsafe_code)]

pub mod balance;
pub mod config;
pub mod connection;
pub mod fanout;
pub mod http;
pub mod hub;
pub mod registry;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod supervisor;
pub mod websocket;

pub use config::HubConfig;
pub use hub::{Hub, HubCommand, HubHandle};
pub use server::{build_router, start, AppState, ServerHandle};
