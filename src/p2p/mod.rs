//! P2P networking module for BlackTrace

pub mod transport;

pub use transport::{Transport, TransportCommand, TransportEvent, TransportHandle};
