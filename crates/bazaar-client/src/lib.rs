//! # bazaar-client
//!
//! Thin WebSocket client for the bazaar hub: connect as a participant or an
//! observer, send typed frames, read decoded frames, reconnect with a fixed
//! backoff.

pub mod client;
pub mod errors;
pub mod reconnect;

pub use client::{ConnectOptions, HubClient};
pub use errors::ClientError;
pub use reconnect::{connect_with_retry, ReconnectPolicy};
