//! Core vocabulary: event types, channels and invariants

pub mod channel;
pub mod event;
pub mod invariant;

pub use channel::ChannelState;
pub use event::{ChannelId, EventKind, EventType};
pub use invariant::{BinaryInvariant, InvariantKind};
