//! Shared primitive types for the Affect Core: the closed dimension set, the
//! closed event-kind set, and the transport/generation wire types.

mod dimension;
mod event;
mod transport;

pub use dimension::Dimension;
pub use event::EventKind;
pub use transport::{DeliverPayload, DeliveryOutcome, GenerateRequest, ToneFlags};
