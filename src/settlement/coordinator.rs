//! Settlement coordinator: generates the HTLC secret, drives the
//! lock/claim state machine, and persists non-terminal records so a
//! restart can recover and re-arm watches. Keeps the shape of an earlier
//! `blacktrace-go/settlement-service/src/main.rs`
//! (`DashMap<String, SettlementState>`, `generate_secret_and_hash`,
//! `ready -> alice_locked -> both_locked` progression), with the
//! cross-process NATS transport replaced by the in-process `InternalBus`.

use super::bus::{InternalBus, SettlementRequestEvent, SettlementSecretEvent, SettlementStatusEvent};
use super::record::{SettlementRecord, SettlementStatus};
use crate::error::{BlackTraceError, Result};
use crate::types::{now_ms, PeerID, ProposalID};
use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SettlementCoordinator {
    records: DashMap<String, SettlementRecord>,
    bus: Arc<InternalBus>,
    db: Option<sled::Db>,
    dest_timeout_secs: u64,
    source_timeout_multiplier: u64,
    failure_margin_secs: u64,
}

impl SettlementCoordinator {
    pub fn new(
        bus: Arc<InternalBus>,
        data_dir: &str,
        dest_timeout_secs: u64,
        source_timeout_multiplier: u64,
        failure_margin_secs: u64,
    ) -> Result<Self> {
        let db = sled::open(data_dir)?;
        let coordinator = SettlementCoordinator {
            records: DashMap::new(),
            bus,
            db: Some(db),
            dest_timeout_secs,
            source_timeout_multiplier,
            failure_margin_secs,
        };
        coordinator.recover()?;
        Ok(coordinator)
    }

    #[cfg(test)]
    pub fn new_in_memory(bus: Arc<InternalBus>) -> Self {
        SettlementCoordinator {
            records: DashMap::new(),
            bus,
            db: None,
            dest_timeout_secs: 3600,
            source_timeout_multiplier: 2,
            failure_margin_secs: 300,
        }
    }

    fn recover(&self) -> Result<()> {
        let Some(db) = &self.db else { return Ok(()) };
        for item in db.iter() {
            let (_key, value) = item?;
            let record: SettlementRecord = serde_json::from_slice(&value)?;
            info!(proposal_id = %record.proposal_id.0, status = ?record.status, "recovered non-terminal settlement record");
            self.records.insert(record.proposal_id.0.clone(), record);
        }
        Ok(())
    }

    fn persist(&self, record: &SettlementRecord) -> Result<()> {
        let Some(db) = &self.db else { return Ok(()) };
        if record.is_non_terminal() {
            let bytes = serde_json::to_vec(record)?;
            db.insert(record.proposal_id.0.as_bytes(), bytes)?;
        } else {
            db.remove(record.proposal_id.0.as_bytes())?;
        }
        db.flush()?;
        Ok(())
    }

    /// `begin_settlement`: generate the secret, compute timelock-safe
    /// timeouts, persist, and publish `settlement.request.<id>`.
    pub fn begin_settlement(
        &self,
        proposal_id: ProposalID,
        order_id: crate::types::OrderID,
        maker_peer: PeerID,
        taker_peer: PeerID,
        amount_source: u64,
        amount_dest: u64,
    ) -> Result<SettlementRecord> {
        if self.records.contains_key(&proposal_id.0) {
            return Err(BlackTraceError::SettlementFailed(format!(
                "settlement already begun for proposal {}",
                proposal_id.0
            )));
        }

        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        let hash = crate::crypto::hash160::hash160(&secret);

        let now = now_ms() / 1000;
        let dest_timeout_abs = now + self.dest_timeout_secs;
        let source_timeout_abs = now + self.dest_timeout_secs * self.source_timeout_multiplier;

        if source_timeout_abs <= dest_timeout_abs {
            return Err(BlackTraceError::InvariantViolated(
                "source_timeout_abs must exceed dest_timeout_abs".to_string(),
            ));
        }

        let record = SettlementRecord {
            proposal_id: proposal_id.clone(),
            order_id,
            maker_peer,
            taker_peer,
            amount_source,
            amount_dest,
            secret: Some(secret),
            hash,
            status: SettlementStatus::Ready,
            source_lock_txid: None,
            dest_lock_txid: None,
            source_htlc_address: None,
            dest_htlc_address: None,
            source_timeout_abs,
            dest_timeout_abs,
            created_at: now_ms(),
            updated_at: now_ms(),
        };

        self.persist(&record)?;
        self.records.insert(proposal_id.0.clone(), record.clone());

        self.bus.publish_request(SettlementRequestEvent {
            proposal_id: proposal_id.clone(),
            hash_lock: hash,
            source_timeout_abs,
            dest_timeout_abs,
        });
        self.bus.publish_status(SettlementStatusEvent {
            proposal_id,
            status: SettlementStatus::Ready,
        });

        Ok(record)
    }

    /// Idempotent status transition, keyed by `(proposal_id, target_status)`.
    pub fn transition(&self, proposal_id: &ProposalID, target: SettlementStatus) -> Result<()> {
        let mut entry = self
            .records
            .get_mut(&proposal_id.0)
            .ok_or_else(|| BlackTraceError::UnknownOrder(proposal_id.0.clone()))?;

        if entry.status == target {
            return Ok(());
        }

        if entry.status.is_terminal() {
            warn!(proposal_id = %proposal_id.0, "ignoring transition on terminal settlement record");
            return Ok(());
        }

        entry.status = target;
        entry.updated_at = now_ms();
        self.persist(&entry)?;

        self.bus.publish_status(SettlementStatusEvent {
            proposal_id: proposal_id.clone(),
            status: target,
        });

        if target == SettlementStatus::BothLocked {
            let secret = entry
                .secret
                .ok_or_else(|| BlackTraceError::InvariantViolated("both_locked without secret".to_string()))?;
            self.bus.publish_secret(SettlementSecretEvent {
                proposal_id: proposal_id.clone(),
                secret,
            });
        }

        Ok(())
    }

    pub fn get(&self, proposal_id: &ProposalID) -> Option<SettlementRecord> {
        self.records.get(&proposal_id.0).map(|e| e.value().clone())
    }

    pub fn set_lock_txid(&self, proposal_id: &ProposalID, source: Option<String>, dest: Option<String>) -> Result<()> {
        let mut entry = self
            .records
            .get_mut(&proposal_id.0)
            .ok_or_else(|| BlackTraceError::UnknownOrder(proposal_id.0.clone()))?;
        if let Some(txid) = source {
            entry.source_lock_txid = Some(txid);
        }
        if let Some(txid) = dest {
            entry.dest_lock_txid = Some(txid);
        }
        self.persist(&entry)?;
        Ok(())
    }

    /// Failure policy: called by the controller's timer tick.
    /// Transitions records past their failure margin into `failed`.
    pub fn check_timeouts(&self) -> Vec<ProposalID> {
        let now = now_ms() / 1000;
        let mut failed = Vec::new();

        for mut entry in self.records.iter_mut() {
            if entry.status.is_terminal() {
                continue;
            }
            let past_dest_margin = now >= entry.dest_timeout_abs.saturating_sub(self.failure_margin_secs);
            if entry.status == SettlementStatus::MakerLocked && past_dest_margin {
                entry.status = SettlementStatus::Failed;
                entry.updated_at = now_ms();
                failed.push(entry.proposal_id.clone());
            }
        }

        for proposal_id in &failed {
            if let Some(entry) = self.records.get(&proposal_id.0) {
                let _ = self.persist(&entry);
            }
            self.bus.publish_status(SettlementStatusEvent {
                proposal_id: proposal_id.clone(),
                status: SettlementStatus::Failed,
            });
        }

        failed
    }
}
