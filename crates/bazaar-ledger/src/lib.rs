//! The negotiation ledger: offers, invoices, settlements.
//!
//! A [`Ledger`] is a plain synchronous state machine. It owns no clock and no
//! locks; callers pass the current time in and are expected to serialize all
//! access (the hub funnels every mutation through its single event loop).

mod error;
mod ledger;
mod types;

pub use error::Rejection;
pub use ledger::{Ledger, ResetSummary, DEFAULT_INVOICE_TTL};
pub use types::{InvoiceRecord, NegotiationState, TransactionRecord, TransactionStatus};
