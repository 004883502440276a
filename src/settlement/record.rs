//! SettlementRecord: the state owned by the accepting node's coordinator
//! for the lifetime of one atomic swap.

use crate::types::{Hash160, OrderID, PeerID, ProposalID};
use serde::{Deserialize, Serialize};

/// Mirrors `Proposal.settlement_status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStatus {
    None,
    Ready,
    MakerLocked,
    TakerLocked,
    BothLocked,
    MakerClaimed,
    TakerClaimed,
    Complete,
    Failed,
    Refunded,
}

impl SettlementStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementStatus::Complete | SettlementStatus::Failed | SettlementStatus::Refunded)
    }
}

/// The secret is `None` until `begin_settlement`, and is never serialized
/// in a log line or gossip payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub proposal_id: ProposalID,
    pub order_id: OrderID,
    pub maker_peer: PeerID,
    pub taker_peer: PeerID,
    pub amount_source: u64,
    pub amount_dest: u64,
    pub secret: Option<[u8; 32]>,
    pub hash: Hash160,
    pub status: SettlementStatus,
    pub source_lock_txid: Option<String>,
    pub dest_lock_txid: Option<String>,
    pub source_htlc_address: Option<String>,
    pub dest_htlc_address: Option<String>,
    pub source_timeout_abs: u64,
    pub dest_timeout_abs: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl SettlementRecord {
    pub fn is_non_terminal(&self) -> bool {
        !self.status.is_terminal()
    }
}
