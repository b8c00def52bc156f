use std::collections::HashMap;
use std::time::Duration;

use bazaar_core::{Accept, Offer, Pay, TransactionId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::Rejection;
use crate::types::{InvoiceRecord, NegotiationState, TransactionRecord, TransactionStatus};

/// Default age after which an unpaid invoice is dropped.
pub const DEFAULT_INVOICE_TTL: Duration = Duration::from_secs(600);

/// A live negotiation, keyed by offer id.
#[derive(Clone, Debug)]
enum Negotiation {
    Open(Offer),
    Invoiced { offer: Offer, invoice: InvoiceRecord },
}

impl Negotiation {
    fn state(&self) -> NegotiationState {
        match self {
            Self::Open(_) => NegotiationState::Open,
            Self::Invoiced { .. } => NegotiationState::Invoiced,
        }
    }
}

/// Counts of what a [`Ledger::reset`] discarded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    pub offers: usize,
    pub invoices: usize,
    pub transactions: usize,
}

/// Offer → accept → invoice → payment state machine.
///
/// Offer ids are single-use: once an id reaches a terminal state it stays
/// reserved until [`Ledger::reset`]. The terminal-id map therefore grows with
/// every settled or expired offer and is only emptied by a reset.
#[derive(Debug)]
pub struct Ledger {
    live: HashMap<String, Negotiation>,
    closed: HashMap<String, NegotiationState>,
    transactions: Vec<TransactionRecord>,
    invoice_ttl: Duration,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_INVOICE_TTL)
    }
}

impl Ledger {
    pub fn new(invoice_ttl: Duration) -> Self {
        Self {
            live: HashMap::new(),
            closed: HashMap::new(),
            transactions: Vec::new(),
            invoice_ttl,
        }
    }

    pub fn invoice_ttl(&self) -> Duration {
        self.invoice_ttl
    }

    /// Validate and open a new offer.
    pub fn submit_offer(&mut self, offer: Offer) -> Result<Offer, Rejection> {
        require_non_empty("id", &offer.id)?;
        require_non_empty("skill", &offer.skill)?;
        require_non_empty("from", &offer.from)?;
        if !(offer.price.is_finite() && offer.price > 0.0) {
            return Err(Rejection::InvalidPrice(offer.price));
        }
        if self.state_of(&offer.id).is_some() {
            return Err(Rejection::DuplicateOffer(offer.id));
        }

        debug!(offer_id = %offer.id, from = %offer.from, price = offer.price, "offer opened");
        self.live
            .insert(offer.id.clone(), Negotiation::Open(offer.clone()));
        Ok(offer)
    }

    /// Accept an open offer, producing the invoice. The offer's author becomes
    /// the buyer, the acceptor the seller.
    pub fn accept(&mut self, accept: &Accept, now: DateTime<Utc>) -> Result<InvoiceRecord, Rejection> {
        require_non_empty("from", &accept.from)?;
        let offer = match self.live.get(&accept.id) {
            Some(Negotiation::Open(offer)) => offer,
            Some(other) => {
                return Err(Rejection::InvalidState {
                    id: accept.id.clone(),
                    state: other.state(),
                })
            }
            None => return Err(self.missing(&accept.id, Rejection::UnknownOffer(accept.id.clone()))),
        };
        if offer.from == accept.from {
            return Err(Rejection::SelfTrade {
                id: accept.id.clone(),
                address: accept.from.clone(),
            });
        }

        let offer = offer.clone();
        let invoice = InvoiceRecord {
            id: offer.id.clone(),
            buyer: offer.from.clone(),
            seller: accept.from.clone(),
            price: offer.price,
            skill: offer.skill.clone(),
            created_at: now,
        };
        debug!(offer_id = %invoice.id, buyer = %invoice.buyer, seller = %invoice.seller, "invoice issued");
        self.live.insert(
            offer.id.clone(),
            Negotiation::Invoiced {
                offer,
                invoice: invoice.clone(),
            },
        );
        Ok(invoice)
    }

    /// Settle an invoice. Only the buyer may pay, and a settlement reference
    /// is required. Produces exactly one transaction record.
    pub fn pay(&mut self, pay: &Pay, now: DateTime<Utc>) -> Result<TransactionRecord, Rejection> {
        let invoice = match self.live.get(&pay.id) {
            Some(Negotiation::Invoiced { invoice, .. }) => invoice,
            Some(other) => {
                return Err(Rejection::InvalidState {
                    id: pay.id.clone(),
                    state: other.state(),
                })
            }
            None => return Err(self.missing(&pay.id, Rejection::UnknownInvoice(pay.id.clone()))),
        };
        if pay.from != invoice.buyer {
            return Err(Rejection::WrongPayer {
                id: pay.id.clone(),
                expected: invoice.buyer.clone(),
                actual: pay.from.clone(),
            });
        }
        require_non_empty("tx", &pay.tx)?;

        let record = TransactionRecord {
            id: TransactionId::new(),
            offer_id: invoice.id.clone(),
            timestamp: now,
            from: invoice.buyer.clone(),
            to: invoice.seller.clone(),
            amount: invoice.price,
            skill: invoice.skill.clone(),
            settlement_ref: pay.tx.clone(),
            status: TransactionStatus::Completed,
        };
        self.live.remove(&pay.id);
        self.closed.insert(pay.id.clone(), NegotiationState::Settled);
        self.transactions.push(record.clone());
        debug!(offer_id = %record.offer_id, tx_id = %record.id, "invoice settled");
        Ok(record)
    }

    /// Drop every invoice older than the TTL. No transaction record is made
    /// and the removed invoices are returned for logging only.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<InvoiceRecord> {
        let ttl = self.invoice_ttl;
        let expired: Vec<String> = self
            .live
            .iter()
            .filter_map(|(id, negotiation)| match negotiation {
                Negotiation::Invoiced { invoice, .. } if is_older_than(invoice.created_at, now, ttl) => {
                    Some(id.clone())
                }
                _ => None,
            })
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(Negotiation::Invoiced { invoice, .. }) = self.live.remove(&id) {
                self.closed.insert(id, NegotiationState::Expired);
                removed.push(invoice);
            }
        }
        removed
    }

    /// Forget all offers, invoices, reserved ids and transactions.
    pub fn reset(&mut self) -> ResetSummary {
        let invoices = self
            .live
            .values()
            .filter(|n| matches!(n, Negotiation::Invoiced { .. }))
            .count();
        let summary = ResetSummary {
            offers: self.live.len() - invoices,
            invoices,
            transactions: self.transactions.len(),
        };
        self.live.clear();
        self.closed.clear();
        self.transactions.clear();
        summary
    }

    pub fn state_of(&self, id: &str) -> Option<NegotiationState> {
        self.live
            .get(id)
            .map(Negotiation::state)
            .or_else(|| self.closed.get(id).copied())
    }

    /// The offer behind a live negotiation, open or invoiced.
    pub fn offer(&self, id: &str) -> Option<&Offer> {
        self.live.get(id).map(|n| match n {
            Negotiation::Open(offer) | Negotiation::Invoiced { offer, .. } => offer,
        })
    }

    pub fn invoice(&self, id: &str) -> Option<&InvoiceRecord> {
        match self.live.get(id) {
            Some(Negotiation::Invoiced { invoice, .. }) => Some(invoice),
            _ => None,
        }
    }

    /// Open offers, ordered by id.
    pub fn open_offers(&self) -> Vec<&Offer> {
        let mut offers: Vec<&Offer> = self
            .live
            .values()
            .filter_map(|n| match n {
                Negotiation::Open(offer) => Some(offer),
                Negotiation::Invoiced { .. } => None,
            })
            .collect();
        offers.sort_by(|a, b| a.id.cmp(&b.id));
        offers
    }

    /// Unpaid invoices, oldest first.
    pub fn pending_invoices(&self) -> Vec<&InvoiceRecord> {
        let mut invoices: Vec<&InvoiceRecord> = self
            .live
            .values()
            .filter_map(|n| match n {
                Negotiation::Invoiced { invoice, .. } => Some(invoice),
                Negotiation::Open(_) => None,
            })
            .collect();
        invoices.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        invoices
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    /// A missing live entry is either unknown or already terminal.
    fn missing(&self, id: &str, unknown: Rejection) -> Rejection {
        match self.closed.get(id) {
            Some(state) => Rejection::InvalidState {
                id: id.to_owned(),
                state: *state,
            },
            None => unknown,
        }
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), Rejection> {
    if value.trim().is_empty() {
        Err(Rejection::EmptyField(field))
    } else {
        Ok(())
    }
}

fn is_older_than(created_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now.signed_duration_since(created_at)
        .to_std()
        .map(|age| age > ttl)
        .unwrap_or(false)
}
