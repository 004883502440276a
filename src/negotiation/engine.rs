//! Negotiation engine: a registry of per-order `NegotiationSession`s
//! with per-order locking, mirroring `OrderBook`'s
//! `DashMap<OrderID, Arc<Mutex<()>>>` single-writer-per-entity pattern so
//! concurrent negotiations on different orders never block each other.

use super::session::NegotiationSession;
use super::types::Proposal;
use crate::error::{BlackTraceError, Result};
use crate::types::{OrderID, PeerID, ProposalID};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct NegotiationEngine {
    sessions: DashMap<OrderID, NegotiationSession>,
    locks: DashMap<OrderID, Arc<Mutex<()>>>,
}

impl NegotiationEngine {
    pub fn new() -> Self {
        NegotiationEngine {
            sessions: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, order_id: &OrderID) -> Arc<Mutex<()>> {
        self.locks
            .entry(order_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Submit a new proposal against an order. Creates the
    /// session on first proposal. `min_price`/`max_price` come from the
    /// order being proposed against; a price outside that range is
    /// rejected locally and no proposal is recorded (scenario S6).
    #[allow(clippy::too_many_arguments)]
    pub async fn propose(
        &self,
        proposal_id: ProposalID,
        order_id: OrderID,
        proposer_peer: PeerID,
        proposer_user: &str,
        price: u64,
        amount: u64,
        min_price: u64,
        max_price: u64,
        encrypted_payload: Vec<u8>,
    ) -> Result<Proposal> {
        if price < min_price || price > max_price {
            return Err(BlackTraceError::PriceOutOfRange);
        }

        let lock = self.lock_for(&order_id);
        let _guard = lock.lock().await;

        let proposal = Proposal::new(
            proposal_id,
            order_id.clone(),
            proposer_peer,
            proposer_user,
            price,
            amount,
            encrypted_payload,
        );

        let mut session = self
            .sessions
            .entry(order_id.clone())
            .or_insert_with(|| NegotiationSession::new(order_id.clone()));
        session.add_proposal(proposal.clone());

        Ok(proposal)
    }

    /// Ingest a proposal received from a counterparty over the wire.
    pub async fn ingest_proposal(&self, proposal: Proposal) -> Result<()> {
        let order_id = proposal.order_id.clone();
        let lock = self.lock_for(&order_id);
        let _guard = lock.lock().await;

        let mut session = self
            .sessions
            .entry(order_id.clone())
            .or_insert_with(|| NegotiationSession::new(order_id.clone()));
        session.add_proposal(proposal);

        Ok(())
    }

    /// Accept a proposal, superseding other pending proposals for the
    /// same order (invariant 6: at most one accepted proposal per order).
    pub async fn accept(&self, order_id: &OrderID, proposal_id: &ProposalID) -> Result<Proposal> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let mut session = self
            .sessions
            .get_mut(order_id)
            .ok_or_else(|| BlackTraceError::UnknownOrder(order_id.0.clone()))?;

        session.accept(proposal_id)?;
        session
            .find(proposal_id)
            .cloned()
            .ok_or_else(|| BlackTraceError::UnknownOrder(proposal_id.0.clone()))
    }

    pub async fn reject(&self, order_id: &OrderID, proposal_id: &ProposalID) -> Result<()> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let mut session = self
            .sessions
            .get_mut(order_id)
            .ok_or_else(|| BlackTraceError::UnknownOrder(order_id.0.clone()))?;

        session.reject(proposal_id)
    }

    pub fn accepted_proposal(&self, order_id: &OrderID) -> Option<Proposal> {
        self.sessions.get(order_id).and_then(|s| s.accepted_proposal().cloned())
    }

    pub fn proposals(&self, order_id: &OrderID) -> Vec<Proposal> {
        self.sessions
            .get(order_id)
            .map(|s| s.proposals().to_vec())
            .unwrap_or_default()
    }
}

impl Default for NegotiationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_id() -> OrderID {
        OrderID::generate("nodeA")
    }

    #[tokio::test]
    async fn test_propose_creates_session() {
        let engine = NegotiationEngine::new();
        let order_id = order_id();

        let proposal = engine
            .propose(ProposalID("p1".to_string()), order_id.clone(), PeerID("taker".to_string()), "bob", 460, 10000, 450, 470, vec![])
            .await
            .unwrap();

        assert_eq!(engine.proposals(&order_id).len(), 1);
        assert_eq!(proposal.price, 460);
    }

    #[tokio::test]
    async fn test_propose_out_of_range_price_rejected() {
        let engine = NegotiationEngine::new();
        let order_id = order_id();

        let result = engine
            .propose(ProposalID("p1".to_string()), order_id.clone(), PeerID("taker".to_string()), "bob", 400, 10000, 450, 470, vec![])
            .await;

        assert!(matches!(result, Err(BlackTraceError::PriceOutOfRange)));
        assert!(engine.proposals(&order_id).is_empty());
    }

    #[tokio::test]
    async fn test_accept_marks_proposal_accepted() {
        let engine = NegotiationEngine::new();
        let order_id = order_id();

        let p1 = engine
            .propose(ProposalID("p1".to_string()), order_id.clone(), PeerID("taker".to_string()), "bob", 460, 10000, 450, 470, vec![])
            .await
            .unwrap();
        let _p2 = engine
            .propose(ProposalID("p2".to_string()), order_id.clone(), PeerID("taker2".to_string()), "eve", 455, 10000, 450, 470, vec![])
            .await
            .unwrap();

        let accepted = engine.accept(&order_id, &p1.proposal_id).await.unwrap();
        assert_eq!(accepted.proposal_id, p1.proposal_id);
        assert!(engine.accepted_proposal(&order_id).is_some());
    }

    #[tokio::test]
    async fn test_accept_unknown_order_fails() {
        let engine = NegotiationEngine::new();
        let result = engine.accept(&order_id(), &ProposalID("nope".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ingest_proposal_from_wire() {
        let engine = NegotiationEngine::new();
        let order_id = order_id();
        let proposal = Proposal::new(
            ProposalID::generate("nodeB"),
            order_id.clone(),
            PeerID("maker".to_string()),
            "alice",
            458,
            10000,
            vec![],
        );

        engine.ingest_proposal(proposal.clone()).await.unwrap();

        assert_eq!(engine.proposals(&order_id).len(), 1);
    }
}
