//! Shared vocabulary of the bazaar hub: wire frames, connection roles,
//! branded ids, cosmetic naming and the hub error taxonomy.

pub mod errors;
pub mod frame;
pub mod ids;
pub mod naming;
pub mod role;

pub use errors::HubError;
pub use frame::{Accept, Chat, Envelope, Frame, FrameError, Invoice, Kind, Offer, Pay, SYSTEM_SENDER};
pub use ids::{ConnectionId, TransactionId};
pub use naming::{friendly_name, introduced_name};
pub use role::{Role, UnknownRole};
