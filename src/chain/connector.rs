//! Chain connector interface: the capability set every chain adapter
//! implements — new chains are added by implementing `{lock, claim,
//! refund, watch}`, no changes needed in the settlement coordinator.

use crate::error::Result;
use crate::types::Hash160;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockParams {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
    pub hash_lock: Hash160,
    pub absolute_timeout: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockOutcome {
    pub htlc_ref: String,
    pub lock_txid: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Confirmed,
    TimedOut,
}

#[derive(Clone, Debug)]
pub enum WatchEvent {
    Locked,
    Claimed { secret: [u8; 32] },
    Refunded,
}

/// Implemented by both `zcash::ZcashConnector` (UTXO/script) and
/// `contract::ContractConnector` (account/contract). `HTLCContract`'s
/// invariants in the Solana reference program are the mirror for what
/// every adapter's pre-flight checks must reject before ever broadcasting.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    async fn lock(&self, params: LockParams) -> Result<LockOutcome>;
    async fn claim(&self, htlc_ref: &str, secret: [u8; 32]) -> Result<String>;
    async fn refund(&self, htlc_ref: &str) -> Result<String>;
    async fn wait_for_confirmation(&self, txid: &str, conf_depth: u32) -> Result<ConfirmationStatus>;
    async fn watch(&self, htlc_ref: &str) -> Result<WatchEvent>;
}

#[cfg(test)]
pub mod test_double {
    //! In-process test double used by `settlement::scenarios` so protocol
    //! logic is exercised deterministically, without live chain RPC.
    //! `#[cfg(test)]`-gated, so it only exists inside this crate's own
    //! test build, not to external `tests/` integration binaries.
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum HtlcState {
        Locked,
        Claimed,
        Refunded,
    }

    struct HtlcRecord {
        state: HtlcState,
        hash_lock: Hash160,
        absolute_timeout: u64,
        secret: Option<[u8; 32]>,
    }

    /// A fake chain: `lock`/`claim`/`refund` mutate an in-memory map and
    /// enforce the same invariants a real HTLC script/contract would.
    pub struct FakeChainConnector {
        htlcs: DashMap<String, HtlcRecord>,
        counter: AtomicU64,
        now: AtomicU64,
    }

    impl FakeChainConnector {
        pub fn new() -> Self {
            FakeChainConnector {
                htlcs: DashMap::new(),
                counter: AtomicU64::new(0),
                now: AtomicU64::new(0),
            }
        }

        pub fn advance_time(&self, secs: u64) {
            self.now.fetch_add(secs, Ordering::SeqCst);
        }

        fn now(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }
    }

    impl Default for FakeChainConnector {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ChainConnector for FakeChainConnector {
        async fn lock(&self, params: LockParams) -> Result<LockOutcome> {
            let id = self.counter.fetch_add(1, Ordering::SeqCst);
            let htlc_ref = format!("fake_htlc_{id}");
            self.htlcs.insert(
                htlc_ref.clone(),
                HtlcRecord {
                    state: HtlcState::Locked,
                    hash_lock: params.hash_lock,
                    absolute_timeout: params.absolute_timeout,
                    secret: None,
                },
            );
            Ok(LockOutcome { htlc_ref: htlc_ref.clone(), lock_txid: format!("{htlc_ref}_lock_tx") })
        }

        async fn claim(&self, htlc_ref: &str, secret: [u8; 32]) -> Result<String> {
            use crate::crypto::hash160::hash160;
            let mut record = self
                .htlcs
                .get_mut(htlc_ref)
                .ok_or_else(|| crate::error::BlackTraceError::TransactionNotFound(htlc_ref.to_string()))?;

            if record.state != HtlcState::Locked {
                return Err(crate::error::BlackTraceError::ClaimRejected("already settled".to_string()));
            }
            if hash160(&secret) != record.hash_lock {
                return Err(crate::error::BlackTraceError::SecretHashMismatch);
            }
            record.state = HtlcState::Claimed;
            record.secret = Some(secret);
            Ok(format!("{htlc_ref}_claim_tx"))
        }

        async fn refund(&self, htlc_ref: &str) -> Result<String> {
            let mut record = self
                .htlcs
                .get_mut(htlc_ref)
                .ok_or_else(|| crate::error::BlackTraceError::TransactionNotFound(htlc_ref.to_string()))?;

            if record.state != HtlcState::Locked {
                return Err(crate::error::BlackTraceError::ClaimRejected("already settled".to_string()));
            }
            if self.now() < record.absolute_timeout {
                return Err(crate::error::BlackTraceError::TooEarly);
            }
            record.state = HtlcState::Refunded;
            Ok(format!("{htlc_ref}_refund_tx"))
        }

        async fn wait_for_confirmation(&self, _txid: &str, _conf_depth: u32) -> Result<ConfirmationStatus> {
            Ok(ConfirmationStatus::Confirmed)
        }

        async fn watch(&self, htlc_ref: &str) -> Result<WatchEvent> {
            let record = self
                .htlcs
                .get(htlc_ref)
                .ok_or_else(|| crate::error::BlackTraceError::TransactionNotFound(htlc_ref.to_string()))?;
            Ok(match record.state {
                HtlcState::Locked => WatchEvent::Locked,
                HtlcState::Claimed => WatchEvent::Claimed { secret: record.secret.unwrap() },
                HtlcState::Refunded => WatchEvent::Refunded,
            })
        }
    }
}
