//! Node controller: one cooperatively-scheduled `tokio::select!` loop
//! over transport events, local commands, internal bus events, and
//! timers. No blocking I/O runs inside the loop body, only inside
//! spawned tasks that post their completion back as events.

use crate::chain::ChainConnector;
use crate::codec::{Envelope, MessageType, PeerKeyCache};
use crate::config::NodeConfig;
use crate::crypto::ecies;
use crate::error::{BlackTraceError, Result};
use crate::identity::IdentityStore;
use crate::negotiation::{NegotiationEngine, Proposal};
use crate::orderbook::{OrderBook, OrderDetails};
use crate::p2p::{Transport, TransportEvent, TransportHandle};
use crate::settlement::{InternalBus, SettlementCoordinator};
use crate::types::{Hash160, OrderID, PeerID, ProposalID, StablecoinType};
use secp256k1::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Wire shape of a `proposal` message's encrypted sub-payload (§6.1):
/// sealed to the order's maker so only they can read the proposer's terms.
#[derive(Serialize, Deserialize)]
struct ProposalTerms {
    proposal_id: ProposalID,
    order_id: OrderID,
    price: u64,
    amount: u64,
    proposer_pubkey: Vec<u8>,
}

/// Wire shape of an `accept` message (§6.1): replaces the old raw-`Proposal`
/// payload with exactly what the taker needs to mirror the settlement.
#[derive(Serialize, Deserialize)]
struct AcceptPayload {
    proposal_id: ProposalID,
    hash_lock: Hash160,
    dest_timeout_abs: u64,
    source_timeout_abs: u64,
}

/// Wire shape of an `order_details` request/response (§6.1).
#[derive(Serialize, Deserialize)]
struct OrderRequestPayload {
    order_id: OrderID,
}

/// Commands sent in from any API-boundary adapter: any HTTP/CLI layer
/// is a thin adapter sending commands into the node.
#[derive(Debug)]
pub enum NodeCommand {
    CreateOrder {
        maker_user: String,
        source_asset: String,
        dest_asset: StablecoinType,
        amount: u64,
        min_price: u64,
        max_price: u64,
        viewing_key: Vec<u8>,
        /// If given, the order's details are ECIES-sealed to this user's
        /// long-term pubkey rather than left for open discovery.
        target_user: Option<String>,
        reply: mpsc::Sender<Result<OrderID>>,
    },
    ListOrders {
        reply: mpsc::Sender<Vec<crate::orderbook::Order>>,
    },
    Propose {
        order_id: OrderID,
        proposer_user: String,
        price: u64,
        amount: u64,
        reply: mpsc::Sender<Result<Proposal>>,
    },
    Accept {
        order_id: OrderID,
        proposal_id: ProposalID,
        /// The accepting user's session id — `accept` is signed with the
        /// user's own identity key, not the node's transport key.
        session_id: String,
        reply: mpsc::Sender<Result<()>>,
    },
    Reject {
        order_id: OrderID,
        proposal_id: ProposalID,
        reply: mpsc::Sender<Result<()>>,
    },
    Dial {
        addr: libp2p::Multiaddr,
    },
    Shutdown,
}

/// Shared application state for the running node.
pub struct Node {
    config: NodeConfig,
    node_fingerprint: String,
    transport: Arc<Mutex<TransportHandle>>,
    orderbook: Arc<OrderBook>,
    negotiation: Arc<NegotiationEngine>,
    settlement: Arc<SettlementCoordinator>,
    identity: Arc<IdentityStore>,
    bus: Arc<InternalBus>,
    peer_keys: Arc<PeerKeyCache>,
    source_chain: Arc<dyn ChainConnector>,
    dest_chain: Arc<dyn ChainConnector>,
    /// Transport-level signing identity, generated once at startup and
    /// reused for every envelope this node seals — a fresh key per message
    /// would make `PeerKeyCache` flag every message as a key change on the
    /// receiving end.
    signing_keypair: crate::crypto::signing::KeyPair,
    command_tx: mpsc::Sender<NodeCommand>,
    command_rx: Arc<Mutex<mpsc::Receiver<NodeCommand>>>,
    cancel: CancellationToken,
}

impl Node {
    /// Assemble the node: starts the transport swarm task, opens the
    /// identity/settlement stores, and returns the controller plus a
    /// command sender for whatever API-boundary adapter drives it.
    pub async fn new(
        config: NodeConfig,
        node_fingerprint: String,
        source_chain: Arc<dyn ChainConnector>,
        dest_chain: Arc<dyn ChainConnector>,
    ) -> Result<(Self, mpsc::Sender<NodeCommand>)> {
        let (transport, handle) = Transport::new(&config.p2p, config.peer_unhealthy_threshold)
            .map_err(|e| BlackTraceError::NetworkConnection(e.to_string()))?;

        tokio::spawn(transport.run());

        let bus = Arc::new(InternalBus::new());
        let settlement = Arc::new(SettlementCoordinator::new(
            bus.clone(),
            &config.settlement.data_dir,
            config.settlement.dest_timeout_secs,
            config.settlement.source_timeout_multiplier,
            config.settlement.failure_margin_secs,
        )?);
        let identity = Arc::new(IdentityStore::new(&config.identity.identity_dir, config.identity.session_ttl_secs)?);

        let (command_tx, command_rx) = mpsc::channel(256);

        let node = Node {
            config,
            node_fingerprint,
            transport: Arc::new(Mutex::new(handle)),
            orderbook: Arc::new(OrderBook::new()),
            negotiation: Arc::new(NegotiationEngine::new()),
            settlement,
            identity,
            bus,
            peer_keys: Arc::new(PeerKeyCache::new()),
            source_chain,
            dest_chain,
            signing_keypair: crate::crypto::signing::KeyPair::generate(),
            command_tx: command_tx.clone(),
            command_rx: Arc::new(Mutex::new(command_rx)),
            cancel: CancellationToken::new(),
        };

        Ok((node, command_tx))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn orderbook(&self) -> Arc<OrderBook> {
        self.orderbook.clone()
    }

    pub fn negotiation(&self) -> Arc<NegotiationEngine> {
        self.negotiation.clone()
    }

    pub fn identity(&self) -> Arc<IdentityStore> {
        self.identity.clone()
    }

    pub fn settlement(&self) -> Arc<SettlementCoordinator> {
        self.settlement.clone()
    }

    pub fn source_chain(&self) -> Arc<dyn ChainConnector> {
        self.source_chain.clone()
    }

    pub fn dest_chain(&self) -> Arc<dyn ChainConnector> {
        self.dest_chain.clone()
    }

    pub fn bus(&self) -> Arc<InternalBus> {
        self.bus.clone()
    }

    pub fn command_sender(&self) -> mpsc::Sender<NodeCommand> {
        self.command_tx.clone()
    }

    /// The four-source `tokio::select!` loop. Runs until
    /// `Shutdown` is received or the cancellation token fires, then drains
    /// in-flight work for up to `shutdown_grace_period_secs` before
    /// returning.
    pub async fn run(&self) {
        let mut timer = tokio::time::interval(tokio::time::Duration::from_secs(5));
        let command_rx = self.command_rx.clone();
        let mut command_rx = command_rx.lock().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("node controller cancelled, shutting down");
                    break;
                }

                event = async {
                    let mut transport = self.transport.lock().await;
                    transport.next_event().await
                } => {
                    match event {
                        Some(event) => self.handle_transport_event(event).await,
                        None => {
                            warn!("transport event channel closed");
                            break;
                        }
                    }
                }

                cmd = command_rx.recv() => {
                    match cmd {
                        Some(NodeCommand::Shutdown) => {
                            info!("shutdown command received");
                            self.cancel.cancel();
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break,
                    }
                }

                _ = timer.tick() => {
                    self.handle_timer_tick().await;
                }
            }
        }

        self.shutdown_gracefully().await;
    }

    async fn shutdown_gracefully(&self) {
        let grace = tokio::time::Duration::from_secs(self.config.shutdown_grace_period_secs);
        let _ = tokio::time::timeout(grace, async {
            self.identity.clear_all_sessions();
        })
        .await;
        info!("node controller stopped");
    }

    async fn handle_timer_tick(&self) {
        let failed = self.settlement.check_timeouts();
        for proposal_id in failed {
            warn!(proposal_id = %proposal_id.0, "settlement failed: past failure margin without progress");
        }
    }

    async fn handle_command(&self, cmd: NodeCommand) {
        match cmd {
            NodeCommand::CreateOrder {
                maker_user,
                source_asset,
                dest_asset,
                amount,
                min_price,
                max_price,
                viewing_key,
                target_user,
                reply,
            } => {
                let result = self
                    .create_order(maker_user, source_asset, dest_asset, amount, min_price, max_price, viewing_key, target_user)
                    .await;
                let _ = reply.send(result).await;
            }

            NodeCommand::ListOrders { reply } => {
                let _ = reply.send(self.orderbook.list()).await;
            }

            NodeCommand::Propose {
                order_id,
                proposer_user,
                price,
                amount,
                reply,
            } => {
                let result = self.propose_and_send(order_id, proposer_user, price, amount).await;
                let _ = reply.send(result).await;
            }

            NodeCommand::Accept { order_id, proposal_id, session_id, reply } => {
                let result = self.accept_and_send(&order_id, &proposal_id, &session_id).await;
                let _ = reply.send(result).await;
            }

            NodeCommand::Reject { order_id, proposal_id, reply } => {
                let result = self.negotiation.reject(&order_id, &proposal_id).await;
                let _ = reply.send(result).await;
            }

            NodeCommand::Dial { addr } => {
                if let Err(e) = self.transport.lock().await.dial(addr).await {
                    error!(error = %e, "dial command failed");
                }
            }

            NodeCommand::Shutdown => unreachable!("handled in run()"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_order(
        &self,
        maker_user: String,
        source_asset: String,
        dest_asset: StablecoinType,
        amount: u64,
        min_price: u64,
        max_price: u64,
        viewing_key: Vec<u8>,
        target_user: Option<String>,
    ) -> Result<OrderID> {
        let target_pubkey = target_user
            .as_deref()
            .map(|username| -> Result<PublicKey> {
                let bytes = self.identity.load_pubkey(username)?;
                crate::crypto::signing::public_key_from_bytes(&bytes)
            })
            .transpose()?;

        let local_peer = self.transport.lock().await.local_peer_id().clone();
        let order_id = self.orderbook.create(
            &self.node_fingerprint,
            local_peer,
            &maker_user,
            &source_asset,
            dest_asset,
            amount,
            min_price,
            max_price,
            &viewing_key,
            3600,
            target_pubkey.as_ref(),
        )?;

        if let Some(order) = self.orderbook.get(&order_id) {
            if let Ok(bytes) = serde_json::to_vec(&order) {
                if let Err(e) = self.publish_gossip(MessageType::OrderAnnounce, bytes).await {
                    error!(error = %e, "failed to announce order");
                }
            }
        }

        Ok(order_id)
    }

    /// The pubkey a peer's envelopes have been signed with so far, pinned
    /// by `PeerKeyCache` on first sight — this doubles as their ECIES
    /// recipient key, since both share the secp256k1 keypair.
    fn peer_ecies_pubkey(&self, peer: &PeerID) -> Result<PublicKey> {
        let bytes = self
            .peer_keys
            .get(peer)
            .ok_or_else(|| BlackTraceError::PeerNotFound(peer.0.clone()))?;
        crate::crypto::signing::public_key_from_bytes(&bytes)
    }

    fn own_ecies_secret(&self) -> Result<SecretKey> {
        SecretKey::from_slice(&self.signing_keypair.secret_bytes()).map_err(|_| BlackTraceError::InvalidSecret)
    }

    async fn propose_and_send(&self, order_id: OrderID, proposer_user: String, price: u64, amount: u64) -> Result<Proposal> {
        let order = self
            .orderbook
            .get(&order_id)
            .ok_or_else(|| BlackTraceError::UnknownOrder(order_id.0.clone()))?;

        let local_peer = self.transport.lock().await.local_peer_id().clone();
        let maker_pubkey = self.peer_ecies_pubkey(&order.maker_peer)?;
        let proposal_id = ProposalID::generate(&self.node_fingerprint);
        let terms = ProposalTerms {
            proposal_id: proposal_id.clone(),
            order_id: order_id.clone(),
            price,
            amount,
            proposer_pubkey: self.signing_keypair.public_key_bytes().to_vec(),
        };
        let encrypted_payload = ecies::seal_bytes(&maker_pubkey, &serde_json::to_vec(&terms)?)?;

        let proposal = self
            .negotiation
            .propose(
                proposal_id,
                order_id,
                local_peer,
                &proposer_user,
                price,
                amount,
                order.min_price,
                order.max_price,
                encrypted_payload,
            )
            .await?;

        let bytes = serde_json::to_vec(&proposal)?;
        self.send_direct(&order.maker_peer, MessageType::Proposal, bytes).await?;
        Ok(proposal)
    }

    async fn accept_and_send(&self, order_id: &OrderID, proposal_id: &ProposalID, session_id: &str) -> Result<()> {
        let proposal = self.negotiation.accept(order_id, proposal_id).await?;
        let order = self
            .orderbook
            .get(order_id)
            .ok_or_else(|| BlackTraceError::UnknownOrder(order_id.0.clone()))?;

        self.orderbook.mark_settling(order_id).await?;

        let record = self.settlement.begin_settlement(
            proposal_id.clone(),
            order_id.clone(),
            order.maker_peer.clone(),
            proposal.proposer_peer.clone(),
            proposal.amount,
            proposal.amount * proposal.price,
        )?;

        let accept_payload = AcceptPayload {
            proposal_id: proposal_id.clone(),
            hash_lock: record.hash,
            dest_timeout_abs: record.dest_timeout_abs,
            source_timeout_abs: record.source_timeout_abs,
        };
        let taker_pubkey = self.peer_ecies_pubkey(&proposal.proposer_peer)?;
        let bytes = ecies::seal_bytes(&taker_pubkey, &serde_json::to_vec(&accept_payload)?)?;
        self.send_direct_as_user(session_id, &proposal.proposer_peer, MessageType::Accept, bytes).await?;
        Ok(())
    }

    async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::PeerConnected(peer) => info!(peer = %peer, "peer connected"),
            TransportEvent::PeerDisconnected(peer) => info!(peer = %peer, "peer disconnected"),
            TransportEvent::Inbound { from, envelope, .. } => {
                if let Err(e) = self.dispatch_inbound(&from, envelope).await {
                    warn!(peer = %from, error = %e, "dropped inbound envelope");
                }
            }
        }
    }

    async fn dispatch_inbound(&self, from: &PeerID, raw: Vec<u8>) -> Result<()> {
        let envelope: Envelope = serde_json::from_slice(&raw)?;
        crate::codec::envelope::validate_incoming(&envelope, from, &self.peer_keys)?;

        match envelope.kind {
            MessageType::OrderAnnounce => {
                let order: crate::orderbook::Order = serde_json::from_slice(&envelope.payload)?;
                self.orderbook.ingest(from, order).await?;
            }
            MessageType::Proposal => {
                let proposal: Proposal = serde_json::from_slice(&envelope.payload)?;
                let plaintext = ecies::open_bytes(&self.own_ecies_secret()?, &proposal.encrypted_payload)?;
                let terms: ProposalTerms = serde_json::from_slice(&plaintext)?;
                if terms.proposal_id != proposal.proposal_id
                    || terms.order_id != proposal.order_id
                    || terms.price != proposal.price
                    || terms.amount != proposal.amount
                {
                    return Err(BlackTraceError::InvalidProposal(
                        "encrypted terms do not match the cleartext proposal".to_string(),
                    ));
                }

                let order_id = proposal.order_id.clone();
                self.negotiation.ingest_proposal(proposal).await?;
                // Moves the maker's order out of `Open` so a later `accept`
                // can reach `Settling`; a repeat proposal against an order
                // already past `Open` just no-ops here.
                self.orderbook.mark_negotiating(&order_id).await.ok();
            }
            MessageType::Accept => {
                let plaintext = ecies::open_bytes(&self.own_ecies_secret()?, &envelope.payload)?;
                let accept: AcceptPayload = serde_json::from_slice(&plaintext)?;
                info!(
                    proposal_id = %accept.proposal_id.0,
                    hash_lock = %accept.hash_lock,
                    dest_timeout_abs = accept.dest_timeout_abs,
                    source_timeout_abs = accept.source_timeout_abs,
                    "counterparty accepted proposal"
                );
            }
            MessageType::Reject => {
                info!(peer = %from, "counterparty rejected proposal");
            }
            MessageType::OrderRequest => {
                let request: OrderRequestPayload = serde_json::from_slice(&envelope.payload)?;
                if let Some(order) = self.orderbook.get(&request.order_id) {
                    let requester_pubkey = self.peer_ecies_pubkey(from)?;
                    let details = OrderDetails {
                        order_id: order.order_id.clone(),
                        amount: order.amount,
                        min_price: order.min_price,
                        max_price: order.max_price,
                    };
                    let sealed = ecies::seal_bytes(&requester_pubkey, &serde_json::to_vec(&details)?)?;
                    self.send_direct(from, MessageType::OrderDetails, sealed).await?;
                }
            }
            MessageType::OrderDetails => {
                let plaintext = ecies::open_bytes(&self.own_ecies_secret()?, &envelope.payload)?;
                let details: OrderDetails = serde_json::from_slice(&plaintext)?;
                info!(order_id = %details.order_id, amount = details.amount, "received order details");
            }
            MessageType::StatusUpdate => {
                info!(peer = %from, kind = ?envelope.kind, "received direct message");
            }
        }
        Ok(())
    }

    async fn publish_gossip(&self, kind: MessageType, payload: Vec<u8>) -> Result<()> {
        let keypair = self.signing_keypair()?;
        let envelope = Envelope::seal(kind, payload, &keypair)?;
        let bytes = serde_json::to_vec(&envelope)?;
        self.transport
            .lock()
            .await
            .gossip_publish(bytes)
            .await
            .map_err(|e| BlackTraceError::NetworkConnection(e.to_string()))
    }

    async fn send_direct(&self, peer: &PeerID, kind: MessageType, payload: Vec<u8>) -> Result<()> {
        let keypair = self.signing_keypair()?;
        let envelope = Envelope::seal(kind, payload, &keypair)?;
        let bytes = serde_json::to_vec(&envelope)?;
        self.transport
            .lock()
            .await
            .send_direct(peer.clone(), bytes)
            .await
            .map_err(|e| BlackTraceError::NetworkConnection(e.to_string()))
    }

    fn signing_keypair(&self) -> Result<&crate::crypto::signing::KeyPair> {
        Ok(&self.signing_keypair)
    }

    /// Seal and send an envelope with the acting user's own identity key,
    /// rather than the node's transport key.
    async fn send_direct_as_user(&self, session_id: &str, peer: &PeerID, kind: MessageType, payload: Vec<u8>) -> Result<()> {
        let envelope = self.identity.with_session(session_id, |session| Envelope::seal(kind, payload, session.keypair()))??;
        let bytes = serde_json::to_vec(&envelope)?;
        self.transport
            .lock()
            .await
            .send_direct(peer.clone(), bytes)
            .await
            .map_err(|e| BlackTraceError::NetworkConnection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_command_shutdown_variant_exists() {
        let cmd = NodeCommand::Shutdown;
        assert!(matches!(cmd, NodeCommand::Shutdown));
    }
}
