//! Wire frames exchanged over a hub connection.
//!
//! Every frame is a single JSON object tagged by `t`. Decoding happens in two
//! steps so the router can check role capabilities on the kind alone before
//! the body is validated: [`Envelope::parse`] reads the tag, then
//! [`Envelope::into_frame`] decodes the typed payload.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sender used for frames the hub itself originates.
pub const SYSTEM_SENDER: &str = "system";

/// An advertised willingness to perform `skill` at `price`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub skill: String,
    pub price: f64,
    pub from: String,
}

/// Acceptance of the open offer `id` by `from`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accept {
    pub id: String,
    pub from: String,
}

/// Payment of invoice `id`; `tx` is an opaque settlement reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pay {
    pub id: String,
    pub tx: String,
    pub from: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub text: String,
    pub from: String,
}

impl Chat {
    /// A chat line spoken by the hub.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from: SYSTEM_SENDER.to_string(),
        }
    }
}

/// Server-originated, point-to-point notice that an offer was accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub buyer: String,
    pub seller: String,
    pub price: f64,
    pub skill: String,
    pub from: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Frame {
    #[serde(rename = "OFFER")]
    Offer(Offer),
    #[serde(rename = "ACCEPT")]
    Accept(Accept),
    #[serde(rename = "PAY")]
    Pay(Pay),
    #[serde(rename = "CHAT")]
    Chat(Chat),
    #[serde(rename = "INVOICE")]
    Invoice(Invoice),
}

impl Frame {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Offer(_) => Kind::Offer,
            Self::Accept(_) => Kind::Accept,
            Self::Pay(_) => Kind::Pay,
            Self::Chat(_) => Kind::Chat,
            Self::Invoice(_) => Kind::Invoice,
        }
    }

    /// The address the frame claims to come from.
    pub fn from_address(&self) -> &str {
        match self {
            Self::Offer(f) => &f.from,
            Self::Accept(f) => &f.from,
            Self::Pay(f) => &f.from,
            Self::Chat(f) => &f.from,
            Self::Invoice(f) => &f.from,
        }
    }

    /// Decode a raw text frame in one step.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        Envelope::parse(raw)?.into_frame()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frame discriminant, as carried in the `t` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Offer,
    Accept,
    Pay,
    Chat,
    Invoice,
}

impl Kind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "OFFER" => Some(Self::Offer),
            "ACCEPT" => Some(Self::Accept),
            "PAY" => Some(Self::Pay),
            "CHAT" => Some(Self::Chat),
            "INVOICE" => Some(Self::Invoice),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "OFFER",
            Self::Accept => "ACCEPT",
            Self::Pay => "PAY",
            Self::Chat => "CHAT",
            Self::Invoice => "INVOICE",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Encoding(#[source] serde_json::Error),
    #[error("frame has no `t` tag")]
    MissingKind,
    #[error("unknown frame kind `{0}`")]
    UnknownKind(String),
    #[error("malformed {kind} frame: {source}")]
    Malformed {
        kind: Kind,
        #[source]
        source: serde_json::Error,
    },
}

/// A frame whose kind is known but whose body has not been decoded yet.
#[derive(Debug)]
pub struct Envelope {
    kind: Kind,
    body: Value,
}

impl Envelope {
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let body: Value = serde_json::from_str(raw).map_err(FrameError::Encoding)?;
        let tag = body
            .get("t")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingKind)?;
        let kind = Kind::from_tag(tag).ok_or_else(|| FrameError::UnknownKind(tag.to_owned()))?;
        Ok(Self { kind, body })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn into_frame(self) -> Result<Frame, FrameError> {
        let kind = self.kind;
        serde_json::from_value(self.body).map_err(|source| FrameError::Malformed { kind, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_offer() {
        let frame =
            Frame::decode(r#"{"t":"OFFER","id":"o1","skill":"design","price":0.5,"from":"A"}"#)
                .unwrap();
        assert_eq!(
            frame,
            Frame::Offer(Offer {
                id: "o1".into(),
                skill: "design".into(),
                price: 0.5,
                from: "A".into(),
            })
        );
        assert_eq!(frame.kind(), Kind::Offer);
        assert_eq!(frame.from_address(), "A");
    }

    #[test]
    fn encode_carries_tag() {
        let frame = Frame::Pay(Pay {
            id: "o1".into(),
            tx: "r1".into(),
            from: "A".into(),
        });
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"t": "PAY", "id": "o1", "tx": "r1", "from": "A"}));
    }

    #[test]
    fn invoice_wire_shape() {
        let frame = Frame::Invoice(Invoice {
            id: "o1".into(),
            buyer: "A".into(),
            seller: "B".into(),
            price: 0.5,
            skill: "design".into(),
            from: SYSTEM_SENDER.into(),
        });
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value["t"], "INVOICE");
        assert_eq!(value["buyer"], "A");
        assert_eq!(value["seller"], "B");
        assert_eq!(value["price"], 0.5);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let frame = Frame::decode(r#"{"t":"CHAT","text":"hi","from":"A","mood":"sunny"}"#).unwrap();
        assert_eq!(frame, Frame::Chat(Chat { text: "hi".into(), from: "A".into() }));
    }

    #[test]
    fn bad_encoding_is_reported() {
        assert!(matches!(Frame::decode("{not json"), Err(FrameError::Encoding(_))));
    }

    #[test]
    fn missing_tag_is_reported() {
        assert!(matches!(Frame::decode(r#"{"text":"hi"}"#), Err(FrameError::MissingKind)));
        assert!(matches!(Frame::decode("[1,2]"), Err(FrameError::MissingKind)));
        assert!(matches!(Frame::decode(r#"{"t":7}"#), Err(FrameError::MissingKind)));
    }

    #[test]
    fn unknown_tag_is_reported() {
        match Frame::decode(r#"{"t":"BID","id":"x"}"#) {
            Err(FrameError::UnknownKind(tag)) => assert_eq!(tag, "BID"),
            other => panic!("expected unknown kind, got {other:?}"),
        }
    }

    #[test]
    fn missing_field_is_malformed() {
        match Frame::decode(r#"{"t":"ACCEPT","id":"o1"}"#) {
            Err(FrameError::Malformed { kind, .. }) => assert_eq!(kind, Kind::Accept),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn string_price_is_malformed() {
        let err = Frame::decode(r#"{"t":"OFFER","id":"o1","skill":"x","price":"1","from":"A"}"#)
            .unwrap_err();
        assert!(err.to_string().starts_with("malformed OFFER frame"));
    }

    #[test]
    fn envelope_exposes_kind_before_body_check() {
        let envelope = Envelope::parse(r#"{"t":"PAY"}"#).unwrap();
        assert_eq!(envelope.kind(), Kind::Pay);
        assert!(envelope.into_frame().is_err());
    }

    #[test]
    fn kind_tags() {
        for kind in [Kind::Offer, Kind::Accept, Kind::Pay, Kind::Chat, Kind::Invoice] {
            assert_eq!(Kind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(Kind::from_tag("offer"), None);
    }

    #[test]
    fn system_chat_uses_system_sender() {
        let chat = Chat::system("welcome");
        assert_eq!(chat.from, SYSTEM_SENDER);
    }
}
