//! BlackTrace: a peer-to-peer OTC trading network that settles atomic
//! swaps between a Zcash-like transparent UTXO chain and an EVM/Cairo-L2
//! destination chain via hash-timelocked contracts, with order terms kept
//! private until a counterparty is committed to a negotiation.

pub mod chain;
pub mod cli;
pub mod codec;
pub mod config;
pub mod controller;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod negotiation;
pub mod orderbook;
pub mod p2p;
pub mod settlement;
pub mod types;

pub use error::{BlackTraceError, Result};
