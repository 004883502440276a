//! Negotiation data model: proposals and their status.

use crate::settlement::SettlementStatus;
use crate::types::{now_ms, Hash160, OrderID, PeerID, ProposalID};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Superseded,
}

/// A taker's price/amount offer against a maker's order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: ProposalID,
    pub order_id: OrderID,
    pub proposer_peer: PeerID,
    pub proposer_user: String,
    pub price: u64,
    pub amount: u64,
    pub encrypted_payload: Vec<u8>,
    pub status: ProposalStatus,
    pub settlement_status: SettlementStatus,
    pub hash_lock: Option<Hash160>,
    pub created_at: u64,
}

impl Proposal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        proposal_id: ProposalID,
        order_id: OrderID,
        proposer_peer: PeerID,
        proposer_user: &str,
        price: u64,
        amount: u64,
        encrypted_payload: Vec<u8>,
    ) -> Self {
        Proposal {
            proposal_id,
            order_id,
            proposer_peer,
            proposer_user: proposer_user.to_string(),
            price,
            amount,
            encrypted_payload,
            status: ProposalStatus::Pending,
            settlement_status: SettlementStatus::None,
            hash_lock: None,
            created_at: now_ms(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }
}
