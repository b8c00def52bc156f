use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frame::Kind;

/// Connection role, fixed at connect time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May OFFER, ACCEPT, PAY and CHAT.
    #[default]
    Participant,
    /// Read-only: may only CHAT, receives a filtered feed.
    Observer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Participant => "participant",
            Self::Observer => "observer",
        }
    }

    /// Whether a connection with this role may send frames of `kind`.
    pub fn may_send(&self, kind: Kind) -> bool {
        match self {
            Self::Participant => true,
            Self::Observer => kind == Kind::Chat,
        }
    }

    /// Whether broadcasts of `kind` reach a connection with this role.
    /// INVOICE is never broadcast to anyone.
    pub fn receives_broadcast(&self, kind: Kind) -> bool {
        match self {
            Self::Participant => kind != Kind::Invoice,
            Self::Observer => matches!(kind, Kind::Chat | Kind::Offer | Kind::Accept | Kind::Pay),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "participant" => Ok(Self::Participant),
            "observer" => Ok(Self::Observer),
            _ => Err(UnknownRole(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_participant() {
        assert_eq!(Role::default(), Role::Participant);
    }

    #[test]
    fn parse_roles() {
        assert_eq!("participant".parse::<Role>().unwrap(), Role::Participant);
        assert_eq!("Observer".parse::<Role>().unwrap(), Role::Observer);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn observers_may_only_chat() {
        assert!(Role::Observer.may_send(Kind::Chat));
        for kind in [Kind::Offer, Kind::Accept, Kind::Pay, Kind::Invoice] {
            assert!(!Role::Observer.may_send(kind), "{kind}");
        }
    }

    #[test]
    fn observers_never_receive_invoice_broadcasts() {
        assert!(!Role::Observer.receives_broadcast(Kind::Invoice));
        assert!(!Role::Participant.receives_broadcast(Kind::Invoice));
        for kind in [Kind::Chat, Kind::Offer, Kind::Accept, Kind::Pay] {
            assert!(Role::Observer.receives_broadcast(kind));
            assert!(Role::Participant.receives_broadcast(kind));
        }
    }

    #[test]
    fn serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Observer).unwrap(), "\"observer\"");
    }
}
