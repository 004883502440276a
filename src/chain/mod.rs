//! Chain adapters module.

pub mod connector;
pub mod contract;
pub mod zcash;

pub use connector::{ChainConnector, ConfirmationStatus, LockOutcome, LockParams, WatchEvent};
pub use contract::ContractConnector;
pub use zcash::{HtlcScript, ZcashConnector};
