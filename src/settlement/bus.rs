//! Internal message bus: intra-node, topic-keyed broadcast channels.
//! Keeps the subject naming of an earlier NATS-based settlement service
//! (`settlement.request.<id>`, `settlement.status.<id>`,
//! `settlement.secret.<id>`) as an in-process analogue — strictly
//! intra-node, no cross-process transport.

use crate::settlement::record::SettlementStatus;
use crate::types::ProposalID;
use dashmap::DashMap;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct SettlementRequestEvent {
    pub proposal_id: ProposalID,
    pub hash_lock: crate::types::Hash160,
    pub source_timeout_abs: u64,
    pub dest_timeout_abs: u64,
}

#[derive(Clone, Debug)]
pub struct SettlementStatusEvent {
    pub proposal_id: ProposalID,
    pub status: SettlementStatus,
}

/// Private, single-consumer in spirit: only the party executing the
/// destination claim should subscribe, and the secret is never logged or
/// forwarded over any gossip topic.
#[derive(Clone)]
pub struct SettlementSecretEvent {
    pub proposal_id: ProposalID,
    pub secret: [u8; 32],
}

pub struct InternalBus {
    request_txs: DashMap<String, broadcast::Sender<SettlementRequestEvent>>,
    status_txs: DashMap<String, broadcast::Sender<SettlementStatusEvent>>,
    secret_txs: DashMap<String, broadcast::Sender<SettlementSecretEvent>>,
}

impl InternalBus {
    pub fn new() -> Self {
        InternalBus {
            request_txs: DashMap::new(),
            status_txs: DashMap::new(),
            secret_txs: DashMap::new(),
        }
    }

    pub fn subscribe_request(&self, proposal_id: &ProposalID) -> broadcast::Receiver<SettlementRequestEvent> {
        self.request_txs
            .entry(proposal_id.0.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish_request(&self, event: SettlementRequestEvent) {
        let tx = self
            .request_txs
            .entry(event.proposal_id.0.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone();
        let _ = tx.send(event);
    }

    pub fn subscribe_status(&self, proposal_id: &ProposalID) -> broadcast::Receiver<SettlementStatusEvent> {
        self.status_txs
            .entry(proposal_id.0.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish_status(&self, event: SettlementStatusEvent) {
        let tx = self
            .status_txs
            .entry(event.proposal_id.0.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone();
        let _ = tx.send(event);
    }

    pub fn subscribe_secret(&self, proposal_id: &ProposalID) -> broadcast::Receiver<SettlementSecretEvent> {
        self.secret_txs
            .entry(proposal_id.0.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish the secret. Callers MUST ensure this is only called once
    /// `status = both_locked`.
    pub fn publish_secret(&self, event: SettlementSecretEvent) {
        let tx = self
            .secret_txs
            .entry(event.proposal_id.0.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone();
        let _ = tx.send(event);
    }
}

impl Default for InternalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash160;

    #[test]
    fn test_publish_request_reaches_subscriber() {
        let bus = InternalBus::new();
        let proposal_id = ProposalID("p1".to_string());
        let mut rx = bus.subscribe_request(&proposal_id);

        bus.publish_request(SettlementRequestEvent {
            proposal_id: proposal_id.clone(),
            hash_lock: Hash160([0u8; 20]),
            source_timeout_abs: 100,
            dest_timeout_abs: 50,
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.proposal_id.0, "p1");
    }

    #[test]
    fn test_secret_topic_isolated_per_proposal() {
        let bus = InternalBus::new();
        let p1 = ProposalID("p1".to_string());
        let p2 = ProposalID("p2".to_string());

        let mut rx1 = bus.subscribe_secret(&p1);
        let _rx2 = bus.subscribe_secret(&p2);

        bus.publish_secret(SettlementSecretEvent {
            proposal_id: p1.clone(),
            secret: [7u8; 32],
        });

        assert!(rx1.try_recv().is_ok());
    }
}
