//! Thin command-channel adapter: any HTTP/CLI layer is a thin adapter
//! sending commands into the node. The node owns all state; the CLI
//! only sends `NodeCommand`s and awaits a reply on a one-shot-style
//! channel.

use crate::controller::NodeCommand;
use crate::error::{BlackTraceError, Result};
use crate::identity::IdentityStore;
use crate::negotiation::Proposal;
use crate::orderbook::Order;
use crate::settlement::SettlementCoordinator;
use crate::types::{OrderID, ProposalID, StablecoinType};
use std::sync::Arc;
use tokio::sync::mpsc;

fn parse_stablecoin(s: &str) -> Result<StablecoinType> {
    match s.to_uppercase().as_str() {
        "USDC" => Ok(StablecoinType::USDC),
        "USDT" => Ok(StablecoinType::USDT),
        "DAI" => Ok(StablecoinType::DAI),
        other => Err(BlackTraceError::InvalidConfig(format!("unknown stablecoin: {other}"))),
    }
}

/// A handle a CLI or any other adapter holds onto: a command sender plus
/// direct read access to the identity store, since login/whoami/logout
/// are process-local and don't need to cross the node's event loop.
pub struct NodeClient {
    command_tx: mpsc::Sender<NodeCommand>,
    identity: Arc<IdentityStore>,
    settlement: Arc<SettlementCoordinator>,
}

impl NodeClient {
    pub fn new(command_tx: mpsc::Sender<NodeCommand>, identity: Arc<IdentityStore>, settlement: Arc<SettlementCoordinator>) -> Self {
        NodeClient { command_tx, identity, settlement }
    }

    pub fn register(&self, username: &str, password: &str) -> Result<()> {
        self.identity.register(username, password)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        self.identity.login(username, password)
    }

    pub fn whoami(&self, session_id: &str) -> Result<String> {
        let info = self.identity.whoami(session_id)?;
        Ok(format!("{} (session expires at {})", info.username, info.expires_at))
    }

    pub fn logout(&self, session_id: &str) -> Result<()> {
        self.identity.logout(session_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_order(
        &self,
        maker_user: String,
        source_asset: String,
        dest_asset: &str,
        amount: u64,
        min_price: u64,
        max_price: u64,
        target_user: Option<String>,
    ) -> Result<OrderID> {
        let dest_asset = parse_stablecoin(dest_asset)?;
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        self.command_tx
            .send(NodeCommand::CreateOrder {
                maker_user,
                source_asset,
                dest_asset,
                amount,
                min_price,
                max_price,
                viewing_key: vec![42u8; 32],
                target_user,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BlackTraceError::Internal("node command channel closed".to_string()))?;

        reply_rx
            .recv()
            .await
            .ok_or_else(|| BlackTraceError::Internal("node did not reply".to_string()))?
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        self.command_tx
            .send(NodeCommand::ListOrders { reply: reply_tx })
            .await
            .map_err(|_| BlackTraceError::Internal("node command channel closed".to_string()))?;

        reply_rx
            .recv()
            .await
            .ok_or_else(|| BlackTraceError::Internal("node did not reply".to_string()))
    }

    pub async fn propose(&self, order_id: String, proposer_user: String, price: u64, amount: u64) -> Result<Proposal> {
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        self.command_tx
            .send(NodeCommand::Propose {
                order_id: OrderID(order_id),
                proposer_user,
                price,
                amount,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BlackTraceError::Internal("node command channel closed".to_string()))?;

        reply_rx
            .recv()
            .await
            .ok_or_else(|| BlackTraceError::Internal("node did not reply".to_string()))?
    }

    pub async fn accept(&self, order_id: String, proposal_id: String, session_id: String) -> Result<()> {
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        self.command_tx
            .send(NodeCommand::Accept {
                order_id: OrderID(order_id),
                proposal_id: ProposalID(proposal_id),
                session_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BlackTraceError::Internal("node command channel closed".to_string()))?;

        reply_rx
            .recv()
            .await
            .ok_or_else(|| BlackTraceError::Internal("node did not reply".to_string()))?
    }

    pub async fn reject(&self, order_id: String, proposal_id: String) -> Result<()> {
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        self.command_tx
            .send(NodeCommand::Reject {
                order_id: OrderID(order_id),
                proposal_id: ProposalID(proposal_id),
                reply: reply_tx,
            })
            .await
            .map_err(|_| BlackTraceError::Internal("node command channel closed".to_string()))?;

        reply_rx
            .recv()
            .await
            .ok_or_else(|| BlackTraceError::Internal("node did not reply".to_string()))?
    }

    pub async fn dial(&self, addr: libp2p::Multiaddr) -> Result<()> {
        self.command_tx
            .send(NodeCommand::Dial { addr })
            .await
            .map_err(|_| BlackTraceError::Internal("node command channel closed".to_string()))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(NodeCommand::Shutdown)
            .await
            .map_err(|_| BlackTraceError::Internal("node command channel closed".to_string()))
    }

    pub fn settlement_status(&self, proposal_id: &str) -> Option<String> {
        let record = self.settlement.get(&ProposalID(proposal_id.to_string()))?;
        Some(format!(
            "proposal {}: {:?} (source_tx={:?}, dest_tx={:?})",
            record.proposal_id.0, record.status, record.source_lock_txid, record.dest_lock_txid
        ))
    }
}
