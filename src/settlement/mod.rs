//! Settlement coordinator.

pub mod bus;
pub mod coordinator;
pub mod record;
#[cfg(test)]
mod scenarios;

pub use bus::InternalBus;
pub use coordinator::SettlementCoordinator;
pub use record::{SettlementRecord, SettlementStatus};
