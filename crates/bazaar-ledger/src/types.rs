use std::fmt;

use bazaar_core::{Invoice, TransactionId, SYSTEM_SENDER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single offer id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationState {
    Open,
    Invoiced,
    Settled,
    Expired,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "OPEN",
            Self::Invoiced => "INVOICED",
            Self::Settled => "SETTLED",
            Self::Expired => "EXPIRED",
        })
    }
}

/// An accepted offer awaiting payment. `buyer` made the offer and pays;
/// `seller` accepted it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub id: String,
    pub buyer: String,
    pub seller: String,
    pub price: f64,
    pub skill: String,
    pub created_at: DateTime<Utc>,
}

impl InvoiceRecord {
    /// The point-to-point INVOICE frame sent to both parties.
    pub fn to_frame(&self) -> Invoice {
        Invoice {
            id: self.id.clone(),
            buyer: self.buyer.clone(),
            seller: self.seller.clone(),
            price: self.price,
            skill: self.skill.clone(),
            from: SYSTEM_SENDER.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
}

/// One settled invoice. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub offer_id: String,
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub skill: String,
    pub settlement_ref: String,
    pub status: TransactionStatus,
}
