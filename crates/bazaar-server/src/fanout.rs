//! Audience-aware delivery of frames to registered connections.
//!
//! Every frame is encoded once and shared across recipients. Delivery is
//! best-effort: a full or closed queue drops the frame for that recipient only.

use std::sync::Arc;

use bazaar_core::{Chat, ConnectionId, Frame, HubError, Offer, Role};
use bazaar_ledger::{InvoiceRecord, TransactionRecord};
use tracing::{debug, warn};

use crate::registry::ConnectionRegistry;

pub const PARTICIPANT_WELCOME: &str =
    "Welcome to the bazaar. Send OFFER, ACCEPT, PAY or CHAT frames to trade.";
pub const OBSERVER_WELCOME: &str =
    "Welcome to the bazaar. Observers see the market and may CHAT, but cannot trade.";
pub const RESET_NOTICE: &str =
    "The market has been reset. Open offers, invoices and transactions were cleared.";

fn encode(frame: &Frame) -> Option<Arc<String>> {
    match frame.encode() {
        Ok(text) => Some(Arc::new(text)),
        Err(e) => {
            warn!(kind = %frame.kind(), error = %e, "failed to encode frame");
            None
        }
    }
}

/// Send `frame` to every connection whose role receives its kind, skipping
/// the originating connection. Returns the number of queues that accepted it.
pub fn broadcast(
    registry: &mut ConnectionRegistry,
    origin: Option<&ConnectionId>,
    frame: &Frame,
) -> usize {
    let Some(text) = encode(frame) else {
        return 0;
    };
    let kind = frame.kind();
    let delivered = registry.send_where(&text, |conn| {
        Some(&conn.id) != origin && conn.role.receives_broadcast(kind)
    });
    debug!(%kind, delivered, "broadcast");
    delivered
}

/// Send a hub-spoken chat line to every connection.
pub fn announce(registry: &mut ConnectionRegistry, text: impl Into<String>) -> usize {
    broadcast(registry, None, &Frame::Chat(Chat::system(text)))
}

/// Send a hub-spoken chat line to a single connection.
pub fn notify(registry: &mut ConnectionRegistry, id: &ConnectionId, text: impl Into<String>) -> bool {
    let frame = Frame::Chat(Chat::system(text));
    encode(&frame).is_some_and(|text| registry.send_to(id, &text))
}

/// Send the role-specific greeting to a fresh connection.
pub fn welcome(registry: &mut ConnectionRegistry, id: &ConnectionId, role: Role) -> bool {
    let text = match role {
        Role::Participant => PARTICIPANT_WELCOME,
        Role::Observer => OBSERVER_WELCOME,
    };
    notify(registry, id, text)
}

/// Point-to-point delivery to every live connection bound to `address`.
pub fn deliver_to_address(
    registry: &mut ConnectionRegistry,
    address: &str,
    frame: &Frame,
) -> Result<usize, HubError> {
    let delivered = match encode(frame) {
        Some(text) => registry.send_where(&text, |conn| conn.address() == Some(address)),
        None => 0,
    };
    if delivered == 0 {
        return Err(HubError::DeliveryFailure {
            address: address.to_string(),
        });
    }
    Ok(delivered)
}

/// Deliver an invoice to its buyer and seller, and nobody else.
pub fn deliver_invoice(registry: &mut ConnectionRegistry, invoice: &InvoiceRecord) {
    let frame = Frame::Invoice(invoice.to_frame());
    for party in [&invoice.buyer, &invoice.seller] {
        if let Err(e) = deliver_to_address(registry, party, &frame) {
            debug!(offer_id = %invoice.id, error_kind = e.error_kind(), error = %e, "invoice not delivered");
        }
    }
}

// ── Narration ──────────────────────────────────────────────────────────────

pub fn narrate_offer(registry: &ConnectionRegistry, offer: &Offer) -> String {
    format!(
        "{} offers {} for {} (offer {}).",
        registry.resolve_name(&offer.from),
        offer.skill,
        format_amount(offer.price),
        offer.id
    )
}

pub fn narrate_accept(registry: &ConnectionRegistry, invoice: &InvoiceRecord) -> String {
    format!(
        "{} accepted {}'s offer of {} for {}. Invoice {} is awaiting payment.",
        registry.resolve_name(&invoice.seller),
        registry.resolve_name(&invoice.buyer),
        invoice.skill,
        format_amount(invoice.price),
        invoice.id
    )
}

pub fn narrate_payment(registry: &ConnectionRegistry, record: &TransactionRecord) -> String {
    format!(
        "{} paid {} {} for {}. Deal {} is settled.",
        registry.resolve_name(&record.from),
        registry.resolve_name(&record.to),
        format_amount(record.amount),
        record.skill,
        record.offer_id
    )
}

/// Prices print without a trailing `.0` when whole.
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{amount:.0}")
    } else {
        amount.to_string()
    }
}
