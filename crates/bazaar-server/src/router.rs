//! Inbound frame admission: decode, check the sender's role, and hand back a
//! typed frame or the reason it was refused.

use bazaar_core::{Envelope, Frame, HubError, Kind, Role, SYSTEM_SENDER};

/// Admit one raw text frame from a connection with `role`.
///
/// The role check runs on the kind alone, before the body is validated, so an
/// observer attempting a negotiation frame is refused even when the frame is
/// malformed.
pub fn admit(role: Role, raw: &str) -> Result<Frame, HubError> {
    let envelope = Envelope::parse(raw)?;
    let kind = envelope.kind();

    if !role.may_send(kind) {
        return Err(HubError::CapabilityDenied { role, kind });
    }
    if kind == Kind::Invoice {
        return Err(HubError::ProtocolViolation(
            "INVOICE frames are issued by the hub only".into(),
        ));
    }

    let frame = envelope.into_frame()?;
    let from = frame.from_address().trim();
    if from.is_empty() {
        return Err(HubError::ProtocolViolation(format!(
            "{kind} frame without a sender address"
        )));
    }
    if from == SYSTEM_SENDER {
        return Err(HubError::ProtocolViolation(format!(
            "{kind} frame claims the reserved sender {SYSTEM_SENDER:?}"
        )));
    }
    Ok(frame)
}
