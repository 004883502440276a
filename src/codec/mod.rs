//! Wire codec.

pub mod envelope;

pub use envelope::{Envelope, MessageType, PeerKeyCache};
