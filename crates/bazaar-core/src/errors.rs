use crate::frame::{FrameError, Kind};
use crate::role::Role;

/// Failure classes the hub distinguishes when handling traffic.
///
/// None of these are fatal to the hub or to the connection that caused them;
/// only [`HubError::CapabilityDenied`] is ever reported back over the wire.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("capability denied: {role} connections may not send {kind}")]
    CapabilityDenied { role: Role, kind: Kind },
    #[error("validation failure: {0}")]
    ValidationFailure(String),
    #[error("delivery failure: no live connection bound to {address}")]
    DeliveryFailure { address: String },
    #[error("connection failure: {0}")]
    ConnectionFailure(String),
    #[error("hub loop is not running")]
    Unavailable,
}

impl HubError {
    /// Whether the offending sender gets a reply describing the error.
    pub fn is_reported_to_sender(&self) -> bool {
        matches!(self, Self::CapabilityDenied { .. })
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::CapabilityDenied { .. } => "capability_denied",
            Self::ValidationFailure(_) => "validation_failure",
            Self::DeliveryFailure { .. } => "delivery_failure",
            Self::ConnectionFailure(_) => "connection_failure",
            Self::Unavailable => "unavailable",
        }
    }
}

impl From<FrameError> for HubError {
    fn from(err: FrameError) -> Self {
        Self::ProtocolViolation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_capability_denied_is_reported() {
        let denied = HubError::CapabilityDenied {
            role: Role::Observer,
            kind: Kind::Offer,
        };
        assert!(denied.is_reported_to_sender());
        assert!(!HubError::ProtocolViolation("x".into()).is_reported_to_sender());
        assert!(!HubError::ValidationFailure("x".into()).is_reported_to_sender());
        assert!(!HubError::DeliveryFailure { address: "A".into() }.is_reported_to_sender());
    }

    #[test]
    fn capability_denied_message() {
        let denied = HubError::CapabilityDenied {
            role: Role::Observer,
            kind: Kind::Pay,
        };
        assert_eq!(
            denied.to_string(),
            "capability denied: observer connections may not send PAY"
        );
    }

    #[test]
    fn frame_errors_become_protocol_violations() {
        let err: HubError = FrameError::UnknownKind("BID".into()).into();
        assert_eq!(err.error_kind(), "protocol_violation");
        assert!(err.to_string().contains("BID"));
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(HubError::Unavailable.error_kind(), "unavailable");
        assert_eq!(
            HubError::ConnectionFailure("reset".into()).error_kind(),
            "connection_failure"
        );
    }
}
