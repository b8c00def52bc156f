use crate::types::NegotiationState;

/// Why the ledger refused a frame. Rejections never change ledger state.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("price {0} is not a positive amount")]
    InvalidPrice(f64),
    #[error("offer id `{0}` is already in use")]
    DuplicateOffer(String),
    #[error("no offer with id `{0}`")]
    UnknownOffer(String),
    #[error("no invoice with id `{0}`")]
    UnknownInvoice(String),
    #[error("`{id}` is {state}")]
    InvalidState { id: String, state: NegotiationState },
    #[error("`{address}` cannot accept its own offer `{id}`")]
    SelfTrade { id: String, address: String },
    #[error("invoice `{id}` is payable by `{expected}`, not `{actual}`")]
    WrongPayer {
        id: String,
        expected: String,
        actual: String,
    },
}

impl Rejection {
    /// Short classification string for logging.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyField(_) => "empty_field",
            Self::InvalidPrice(_) => "invalid_price",
            Self::DuplicateOffer(_) => "duplicate_offer",
            Self::UnknownOffer(_) => "unknown_offer",
            Self::UnknownInvoice(_) => "unknown_invoice",
            Self::InvalidState { .. } => "invalid_state",
            Self::SelfTrade { .. } => "self_trade",
            Self::WrongPayer { .. } => "wrong_payer",
        }
    }
}
