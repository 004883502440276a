//! Destination-chain (account/contract) adapter: a generic
//! JSON-RPC-shaped contract-call client. Pre-flight invariant checks
//! mirror the Solana Anchor reference program's `require!` set exactly,
//! run client-side before any call is submitted so a doomed transaction
//! never reaches the network — reject locally what the contract would
//! reject on-chain, without redistributing the contract itself.

use crate::chain::connector::{ChainConnector, ConfirmationStatus, LockOutcome, LockParams, WatchEvent};
use crate::crypto::hash160::hash160;
use crate::error::{BlackTraceError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{sleep, Duration};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HtlcState {
    Locked,
    Claimed,
    Refunded,
}

struct HtlcRecord {
    state: HtlcState,
    sender: String,
    receiver: String,
    hash_lock: crate::types::Hash160,
    absolute_timeout: u64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'a str,
    id: &'a str,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<serde_json::Value>,
}

/// Generic account/contract-chain client. `local_view` mirrors just enough
/// on-chain HTLC state for pre-flight rejection; the RPC calls themselves
/// are the source of truth once a call is actually submitted.
pub struct ContractConnector {
    rpc_url: String,
    client: reqwest::Client,
    local_view: DashMap<String, HtlcRecord>,
    counter: AtomicU64,
    current_time_fn: fn() -> u64,
}

impl ContractConnector {
    pub fn new(rpc_url: String) -> Self {
        ContractConnector {
            rpc_url,
            client: reqwest::Client::new(),
            local_view: DashMap::new(),
            counter: AtomicU64::new(0),
            current_time_fn: default_now,
        }
    }

    /// Test seam: inject a deterministic clock instead of wall time.
    #[cfg(test)]
    pub fn with_clock(rpc_url: String, clock: fn() -> u64) -> Self {
        ContractConnector {
            rpc_url,
            client: reqwest::Client::new(),
            local_view: DashMap::new(),
            counter: AtomicU64::new(0),
            current_time_fn: clock,
        }
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let body = RpcRequest { jsonrpc: "2.0", id: "blacktrace", method, params };

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BlackTraceError::ChainRPCUnavailable(e.to_string()))?;

        let parsed: RpcResponse<T> = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(BlackTraceError::RpcCallFailed(error.to_string()));
        }
        parsed.result.ok_or_else(|| BlackTraceError::InvalidRpcResponse("missing result".to_string()))
    }

    fn now(&self) -> u64 {
        (self.current_time_fn)()
    }
}

fn default_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl ChainConnector for ContractConnector {
    async fn lock(&self, params: LockParams) -> Result<LockOutcome> {
        // Mirrors the Anchor program's lock() require!s.
        if params.amount == 0 {
            return Err(BlackTraceError::InvalidAmount);
        }
        if params.absolute_timeout <= self.now() {
            return Err(BlackTraceError::OrderExpired("absolute_timeout already passed".to_string()));
        }

        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let htlc_ref = format!("htlc_{id}");

        let lock_txid: String = self
            .call(
                "htlc_lock",
                json!({
                    "sender": params.sender,
                    "receiver": params.receiver,
                    "amount": params.amount,
                    "hash_lock": params.hash_lock.to_hex(),
                    "absolute_timeout": params.absolute_timeout,
                }),
            )
            .await?;

        self.local_view.insert(
            htlc_ref.clone(),
            HtlcRecord {
                state: HtlcState::Locked,
                sender: params.sender,
                receiver: params.receiver,
                hash_lock: params.hash_lock,
                absolute_timeout: params.absolute_timeout,
            },
        );

        Ok(LockOutcome { htlc_ref, lock_txid })
    }

    async fn claim(&self, htlc_ref: &str, secret: [u8; 32]) -> Result<String> {
        let mut record = self
            .local_view
            .get_mut(htlc_ref)
            .ok_or_else(|| BlackTraceError::TransactionNotFound(htlc_ref.to_string()))?;

        // Mirrors the Anchor program's claim() require!s: not-claimed,
        // not-refunded, hash match. (Caller identity / signature checks
        // happen at the RPC transport layer, not here.)
        if record.state == HtlcState::Claimed {
            return Err(BlackTraceError::ClaimRejected("already claimed".to_string()));
        }
        if record.state == HtlcState::Refunded {
            return Err(BlackTraceError::ClaimRejected("already refunded".to_string()));
        }
        if self.now() > record.absolute_timeout {
            return Err(BlackTraceError::ClaimRejected("claim window has passed".to_string()));
        }
        if hash160(&secret) != record.hash_lock {
            return Err(BlackTraceError::SecretHashMismatch);
        }

        let txid: String = self
            .call("htlc_claim", json!({ "htlc_ref": htlc_ref, "secret": hex::encode(secret) }))
            .await?;

        record.state = HtlcState::Claimed;
        Ok(txid)
    }

    async fn refund(&self, htlc_ref: &str) -> Result<String> {
        let mut record = self
            .local_view
            .get_mut(htlc_ref)
            .ok_or_else(|| BlackTraceError::TransactionNotFound(htlc_ref.to_string()))?;

        if record.state != HtlcState::Locked {
            return Err(BlackTraceError::ClaimRejected("already settled".to_string()));
        }
        if self.now() < record.absolute_timeout {
            return Err(BlackTraceError::TooEarly);
        }

        let txid: String = self.call("htlc_refund", json!({ "htlc_ref": htlc_ref })).await?;
        record.state = HtlcState::Refunded;
        Ok(txid)
    }

    async fn wait_for_confirmation(&self, txid: &str, conf_depth: u32) -> Result<ConfirmationStatus> {
        let confirmations: u64 = self.call("get_confirmations", json!({ "txid": txid })).await?;
        if confirmations >= conf_depth as u64 {
            Ok(ConfirmationStatus::Confirmed)
        } else {
            Ok(ConfirmationStatus::TimedOut)
        }
    }

    async fn watch(&self, htlc_ref: &str) -> Result<WatchEvent> {
        // A single poll; the caller drives the retry cadence and
        // cancellation via its own select loop.
        let status: serde_json::Value = self.call("htlc_status", json!({ "htlc_ref": htlc_ref })).await?;
        match status.get("state").and_then(|v| v.as_str()) {
            Some("locked") => Ok(WatchEvent::Locked),
            Some("claimed") => {
                let secret_hex = status
                    .get("secret")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| BlackTraceError::InvalidRpcResponse("claimed without secret".to_string()))?;
                let secret_bytes = hex::decode(secret_hex)?;
                let mut secret = [0u8; 32];
                if secret_bytes.len() != 32 {
                    return Err(BlackTraceError::InvalidRpcResponse("secret has wrong length".to_string()));
                }
                secret.copy_from_slice(&secret_bytes);
                Ok(WatchEvent::Claimed { secret })
            }
            Some("refunded") => Ok(WatchEvent::Refunded),
            other => Err(BlackTraceError::InvalidRpcResponse(format!("unknown htlc state: {other:?}"))),
        }
    }
}

/// Polls `watch` at a fixed interval until a terminal event or the
/// deadline passes.
pub async fn poll_until_terminal(
    connector: &ContractConnector,
    htlc_ref: &str,
    poll_interval: Duration,
    deadline: std::time::Instant,
) -> Result<WatchEvent> {
    loop {
        match connector.watch(htlc_ref).await {
            Ok(WatchEvent::Locked) => {}
            Ok(terminal) => return Ok(terminal),
            Err(e) => return Err(e),
        }
        if std::time::Instant::now() >= deadline {
            return Err(BlackTraceError::TimedOut);
        }
        sleep(poll_interval).await;
    }
}
