//! Order book: per-node index of received and own orders, keyed by
//! `order_id`, with single-writer-per-order lifecycle transitions.

use crate::crypto::commitment::generate_commitment;
use crate::crypto::{ecies, LiquidityCommitment};
use crate::error::{BlackTraceError, Result};
use crate::types::{now_ms, OrderID, OrderSide, PeerID, StablecoinType};
use dashmap::DashMap;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Plaintext sealed into `Order.encrypted_details_for_target` and returned
/// in response to a direct `order_details` request (§6.1 wire table).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order_id: OrderID,
    pub amount: u64,
    pub min_price: u64,
    pub max_price: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Open,
    Negotiating,
    Settling,
    Done,
    Expired,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderID,
    pub maker_peer: PeerID,
    pub maker_user: String,
    pub side: OrderSide,
    pub source_asset: String,
    pub dest_asset: StablecoinType,
    pub amount: u64,
    pub min_price: u64,
    pub max_price: u64,
    pub commitment: LiquidityCommitment,
    pub encrypted_details_for_target: Option<Vec<u8>>,
    pub created_at: u64,
    pub expires_at: u64,
    pub state: OrderState,
}

/// Per-node order book. Writes are serialized per `order_id` via a keyed
/// lock: the order book is the only mutable process-wide state an order's
/// lifecycle touches directly.
pub struct OrderBook {
    orders: DashMap<OrderID, Order>,
    locks: DashMap<OrderID, Arc<Mutex<()>>>,
}

impl OrderBook {
    pub fn new() -> Self {
        OrderBook {
            orders: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, order_id: &OrderID) -> Arc<Mutex<()>> {
        self.locks
            .entry(order_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        node_fingerprint: &str,
        maker_peer: PeerID,
        maker_user: &str,
        source_asset: &str,
        dest_asset: StablecoinType,
        amount: u64,
        min_price: u64,
        max_price: u64,
        viewing_key: &[u8],
        expiry_secs: u64,
        target_pubkey: Option<&PublicKey>,
    ) -> Result<OrderID> {
        if min_price == 0 || max_price == 0 || min_price > max_price {
            return Err(BlackTraceError::InvalidPrice);
        }
        if amount == 0 {
            return Err(BlackTraceError::InvalidAmount);
        }

        let order_id = OrderID::generate(node_fingerprint);
        let salt = crate::crypto::commitment::generate_random_salt();
        let commitment = generate_commitment(amount, &salt, min_price, viewing_key, &order_id)?;

        let encrypted_details_for_target = target_pubkey
            .map(|pubkey| {
                let details = OrderDetails {
                    order_id: order_id.clone(),
                    amount,
                    min_price,
                    max_price,
                };
                let plaintext = serde_json::to_vec(&details)?;
                ecies::seal_bytes(pubkey, &plaintext)
            })
            .transpose()?;

        let now = now_ms();
        let order = Order {
            order_id: order_id.clone(),
            maker_peer,
            maker_user: maker_user.to_string(),
            side: OrderSide::Sell,
            source_asset: source_asset.to_string(),
            dest_asset,
            amount,
            min_price,
            max_price,
            commitment,
            encrypted_details_for_target,
            created_at: now,
            expires_at: now + expiry_secs * 1000,
            state: OrderState::Open,
        };

        self.orders.insert(order_id.clone(), order);
        Ok(order_id)
    }

    pub fn list(&self) -> Vec<Order> {
        self.orders.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get(&self, order_id: &OrderID) -> Option<Order> {
        self.orders.get(order_id).map(|e| e.value().clone())
    }

    /// Ingest an order announcement received from a peer.
    pub async fn ingest(&self, from_peer: &PeerID, order: Order) -> Result<()> {
        let _guard = self.lock_for(&order.order_id).lock().await;

        if let Some(existing) = self.orders.get(&order.order_id) {
            if &existing.maker_peer == from_peer {
                return Ok(());
            }
            return Err(BlackTraceError::ConflictingOrderID(order.order_id.to_string()));
        }

        self.orders.insert(order.order_id.clone(), order);
        Ok(())
    }

    async fn transition(&self, order_id: &OrderID, to: OrderState, legal_from: &[OrderState]) -> Result<()> {
        let _guard = self.lock_for(order_id).lock().await;

        let mut entry = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| BlackTraceError::UnknownOrder(order_id.to_string()))?;

        if to != OrderState::Expired && !legal_from.contains(&entry.state) {
            return Err(BlackTraceError::InvalidOrderState(format!(
                "cannot transition order {} from {:?} to {:?}",
                order_id, entry.state, to
            )));
        }

        entry.state = to;
        Ok(())
    }

    pub async fn mark_negotiating(&self, order_id: &OrderID) -> Result<()> {
        self.transition(order_id, OrderState::Negotiating, &[OrderState::Open])
            .await
    }

    pub async fn mark_settling(&self, order_id: &OrderID) -> Result<()> {
        self.transition(order_id, OrderState::Settling, &[OrderState::Negotiating])
            .await
    }

    pub async fn mark_done(&self, order_id: &OrderID) -> Result<()> {
        self.transition(order_id, OrderState::Done, &[OrderState::Settling])
            .await
    }

    pub async fn mark_expired(&self, order_id: &OrderID) -> Result<()> {
        self.transition(order_id, OrderState::Expired, &[]).await
    }

    pub async fn mark_cancelled(&self, order_id: &OrderID) -> Result<()> {
        self.transition(order_id, OrderState::Cancelled, &[OrderState::Open])
            .await
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
