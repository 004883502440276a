//! Per-order negotiation session: the proposal list and which one (if
//! any) has been accepted.

use super::types::{Proposal, ProposalStatus};
use crate::error::{BlackTraceError, Result};
use crate::types::{OrderID, ProposalID};

#[derive(Debug, Default)]
pub struct NegotiationSession {
    order_id: Option<OrderID>,
    proposals: Vec<Proposal>,
    accepted: Option<ProposalID>,
}

impl NegotiationSession {
    pub fn new(order_id: OrderID) -> Self {
        NegotiationSession {
            order_id: Some(order_id),
            proposals: Vec::new(),
            accepted: None,
        }
    }

    pub fn order_id(&self) -> Option<&OrderID> {
        self.order_id.as_ref()
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    pub fn add_proposal(&mut self, proposal: Proposal) {
        self.proposals.push(proposal);
    }

    pub fn find_mut(&mut self, proposal_id: &ProposalID) -> Option<&mut Proposal> {
        self.proposals.iter_mut().find(|p| &p.proposal_id == proposal_id)
    }

    pub fn find(&self, proposal_id: &ProposalID) -> Option<&Proposal> {
        self.proposals.iter().find(|p| &p.proposal_id == proposal_id)
    }

    /// Accept one proposal, superseding all other pending ones for this
    /// order. At most one proposal is ever `accepted` per order at a time.
    pub fn accept(&mut self, proposal_id: &ProposalID) -> Result<()> {
        if self.accepted.is_some() {
            return Err(BlackTraceError::AlreadyAccepted);
        }

        let exists = self.proposals.iter().any(|p| &p.proposal_id == proposal_id);
        if !exists {
            return Err(BlackTraceError::UnknownOrder(proposal_id.0.clone()));
        }

        for proposal in self.proposals.iter_mut() {
            if &proposal.proposal_id == proposal_id {
                proposal.status = ProposalStatus::Accepted;
            } else if proposal.is_pending() {
                proposal.status = ProposalStatus::Superseded;
            }
        }

        self.accepted = Some(proposal_id.clone());
        Ok(())
    }

    pub fn reject(&mut self, proposal_id: &ProposalID) -> Result<()> {
        let proposal = self
            .find_mut(proposal_id)
            .ok_or_else(|| BlackTraceError::UnknownOrder(proposal_id.0.clone()))?;
        proposal.status = ProposalStatus::Rejected;
        Ok(())
    }

    pub fn accepted_proposal(&self) -> Option<&Proposal> {
        self.accepted.as_ref().and_then(|id| self.find(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeerID;

    fn make_proposal(id: &str, order_id: &OrderID) -> Proposal {
        Proposal::new(
            ProposalID(id.to_string()),
            order_id.clone(),
            PeerID("taker1".to_string()),
            "bob",
            460,
            10000,
            vec![],
        )
    }

    #[test]
    fn test_accept_supersedes_other_pending() {
        let order_id = OrderID::generate("nodeA");
        let mut session = NegotiationSession::new(order_id.clone());
        session.add_proposal(make_proposal("p1", &order_id));
        session.add_proposal(make_proposal("p2", &order_id));

        session.accept(&ProposalID("p1".to_string())).unwrap();

        assert_eq!(session.find(&ProposalID("p1".to_string())).unwrap().status, ProposalStatus::Accepted);
        assert_eq!(session.find(&ProposalID("p2".to_string())).unwrap().status, ProposalStatus::Superseded);
    }

    #[test]
    fn test_second_accept_fails() {
        let order_id = OrderID::generate("nodeA");
        let mut session = NegotiationSession::new(order_id.clone());
        session.add_proposal(make_proposal("p1", &order_id));
        session.add_proposal(make_proposal("p2", &order_id));

        session.accept(&ProposalID("p1".to_string())).unwrap();
        let result = session.accept(&ProposalID("p2".to_string()));

        assert!(matches!(result, Err(BlackTraceError::AlreadyAccepted)));
    }

    #[test]
    fn test_reject() {
        let order_id = OrderID::generate("nodeA");
        let mut session = NegotiationSession::new(order_id.clone());
        session.add_proposal(make_proposal("p1", &order_id));

        session.reject(&ProposalID("p1".to_string())).unwrap();
        assert_eq!(session.find(&ProposalID("p1".to_string())).unwrap().status, ProposalStatus::Rejected);
    }
}
