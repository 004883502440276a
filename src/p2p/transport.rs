//! libp2p-backed transport: gossip topic `orders.v1` + direct
//! request/response streams + mdns local discovery + identify, behind a
//! small handle exposing `dial`/`gossip_publish`/`send_direct` and one
//! inbound event stream.

use crate::types::PeerID;
use dashmap::DashMap;
use futures::StreamExt;
use libp2p::{
    gossipsub, identify, mdns, noise,
    request_response::{self, cbor, ProtocolSupport},
    swarm::NetworkBehaviour,
    swarm::SwarmEvent,
    tcp, yamux, Multiaddr, PeerId, StreamProtocol, Swarm,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::P2pConfig;

/// An envelope arriving over either gossip or a direct stream, tagged with
/// its transport so the controller can distinguish broad from targeted
/// traffic if it needs to. One inbound event channel delivers
/// `(from, envelope)` for both gossip and streams, tagged by origin.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Inbound { from: PeerID, envelope: Vec<u8>, via_gossip: bool },
    PeerConnected(PeerID),
    PeerDisconnected(PeerID),
}

#[derive(Debug)]
pub enum TransportCommand {
    Dial(Multiaddr),
    GossipPublish(Vec<u8>),
    SendDirect(PeerID, Vec<u8>),
}

#[derive(NetworkBehaviour)]
struct BlackTraceBehaviour {
    gossipsub: gossipsub::Behaviour,
    mdns: mdns::tokio::Behaviour,
    request_response: cbor::Behaviour<Vec<u8>, ()>,
    identify: identify::Behaviour,
}

/// Application-facing handle. Owns the command/event channels; the swarm
/// itself runs on a spawned task via `Transport::run`.
pub struct TransportHandle {
    command_tx: mpsc::Sender<TransportCommand>,
    event_rx: mpsc::Receiver<TransportEvent>,
    local_peer_id: PeerID,
    failures: Arc<DashMap<PeerId, u32>>,
}

impl TransportHandle {
    pub fn local_peer_id(&self) -> &PeerID {
        &self.local_peer_id
    }

    pub async fn dial(&self, addr: Multiaddr) -> Result<(), mpsc::error::SendError<TransportCommand>> {
        self.command_tx.send(TransportCommand::Dial(addr)).await
    }

    pub async fn gossip_publish(&self, envelope: Vec<u8>) -> Result<(), mpsc::error::SendError<TransportCommand>> {
        self.command_tx.send(TransportCommand::GossipPublish(envelope)).await
    }

    pub async fn send_direct(&self, peer: PeerID, envelope: Vec<u8>) -> Result<(), mpsc::error::SendError<TransportCommand>> {
        self.command_tx.send(TransportCommand::SendDirect(peer, envelope)).await
    }

    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.event_rx.recv().await
    }

    /// Consecutive-failure count recorded for a peer; a peer is excluded
    /// from gossip fan-out once this crosses the configured threshold.
    /// Gossipsub itself does targeted per-peer fan-out exclusion; this
    /// counter drives it.
    pub fn failure_count(&self, peer: &PeerId) -> u32 {
        self.failures.get(peer).map(|c| *c).unwrap_or(0)
    }
}

pub struct Transport {
    swarm: Swarm<BlackTraceBehaviour>,
    topic: gossipsub::IdentTopic,
    command_rx: mpsc::Receiver<TransportCommand>,
    event_tx: mpsc::Sender<TransportEvent>,
    failures: Arc<DashMap<PeerId, u32>>,
    unhealthy_threshold: u32,
}

const DIRECT_PROTOCOL: &str = "/blacktrace/envelope/1.0.0";

impl Transport {
    pub fn new(config: &P2pConfig, unhealthy_threshold: u32) -> Result<(Self, TransportHandle), Box<dyn std::error::Error + Send + Sync>> {
        let topic = gossipsub::IdentTopic::new(&config.gossip_topic);

        let mut swarm = libp2p::SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)?
            .with_behaviour(|key: &libp2p::identity::Keypair| {
                let message_id_fn = |msg: &gossipsub::Message| {
                    let mut s = DefaultHasher::new();
                    msg.data.hash(&mut s);
                    gossipsub::MessageId::from(s.finish().to_string())
                };

                let gossipsub_config = gossipsub::ConfigBuilder::default()
                    .heartbeat_interval(Duration::from_secs(1))
                    .validation_mode(gossipsub::ValidationMode::Strict)
                    .message_id_fn(message_id_fn)
                    .build()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let gossipsub = gossipsub::Behaviour::new(
                    gossipsub::MessageAuthenticity::Signed(key.clone()),
                    gossipsub_config,
                )
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let mdns = mdns::tokio::Behaviour::new(mdns::Config::default(), key.public().to_peer_id())?;

                let request_response = cbor::Behaviour::new(
                    [(StreamProtocol::new(DIRECT_PROTOCOL), ProtocolSupport::Full)],
                    request_response::Config::default(),
                );

                let identify = identify::Behaviour::new(identify::Config::new(
                    "/blacktrace/1.0.0".to_string(),
                    key.public(),
                ));

                Ok(BlackTraceBehaviour { gossipsub, mdns, request_response, identify })
            })?
            .build();

        swarm.behaviour_mut().gossipsub.subscribe(&topic)?;

        let listen_addr: Multiaddr = config.listen_addr.parse()?;
        swarm.listen_on(listen_addr)?;

        for addr_str in &config.bootstrap_peers {
            if let Ok(addr) = addr_str.parse::<Multiaddr>() {
                swarm.dial(addr)?;
            }
        }

        let local_peer_id = PeerID(swarm.local_peer_id().to_string());
        let failures = Arc::new(DashMap::new());
        let (command_tx, command_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);

        let transport = Transport {
            swarm,
            topic,
            command_rx,
            event_tx,
            failures: failures.clone(),
            unhealthy_threshold,
        };
        let handle = TransportHandle { command_tx, event_rx, local_peer_id, failures };

        Ok((transport, handle))
    }

    /// Drive the swarm. Runs for the lifetime of the node; cancel by
    /// dropping the handle's command sender.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(TransportCommand::Dial(addr)) => {
                            if let Err(e) = self.swarm.dial(addr.clone()) {
                                warn!(addr = %addr, error = %e, "dial failed");
                            }
                        }
                        Some(TransportCommand::GossipPublish(envelope)) => {
                            if let Err(e) = self.swarm.behaviour_mut().gossipsub.publish(self.topic.clone(), envelope) {
                                warn!(error = %e, "gossipsub publish failed");
                            }
                        }
                        Some(TransportCommand::SendDirect(peer, envelope)) => {
                            if let Ok(peer_id) = peer.0.parse::<PeerId>() {
                                self.swarm.behaviour_mut().request_response.send_request(&peer_id, envelope);
                            } else {
                                warn!(peer = %peer, "malformed PeerID, cannot send direct");
                            }
                        }
                        None => return,
                    }
                }

                event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(event).await;
                }
            }
        }
    }

    async fn handle_swarm_event(&mut self, event: SwarmEvent<BlackTraceBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(addr = %address, "p2p listening");
            }
            SwarmEvent::Behaviour(BlackTraceBehaviourEvent::Mdns(mdns::Event::Discovered(peers))) => {
                for (peer_id, addr) in peers {
                    debug!(peer = %peer_id, addr = %addr, "mdns discovered peer");
                    let _ = self.swarm.dial(addr);
                }
            }
            SwarmEvent::Behaviour(BlackTraceBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                propagation_source,
                message,
                ..
            })) => {
                let from = PeerID(propagation_source.to_string());
                let _ = self
                    .event_tx
                    .send(TransportEvent::Inbound { from, envelope: message.data, via_gossip: true })
                    .await;
            }
            SwarmEvent::Behaviour(BlackTraceBehaviourEvent::RequestResponse(
                request_response::Event::Message { peer, message, .. },
            )) => match message {
                request_response::Message::Request { request, channel, .. } => {
                    let from = PeerID(peer.to_string());
                    let _ = self
                        .event_tx
                        .send(TransportEvent::Inbound { from, envelope: request, via_gossip: false })
                        .await;
                    let _ = self.swarm.behaviour_mut().request_response.send_response(channel, ());
                }
                request_response::Message::Response { .. } => {}
            },
            SwarmEvent::Behaviour(BlackTraceBehaviourEvent::RequestResponse(
                request_response::Event::OutboundFailure { peer, .. },
            )) => {
                self.record_failure(peer).await;
            }
            SwarmEvent::Behaviour(BlackTraceBehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => {
                for addr in info.listen_addrs {
                    self.swarm.add_peer_address(peer_id, addr);
                }
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                self.failures.remove(&peer_id);
                let _ = self.event_tx.send(TransportEvent::PeerConnected(PeerID(peer_id.to_string()))).await;
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                let _ = self.event_tx.send(TransportEvent::PeerDisconnected(PeerID(peer_id.to_string()))).await;
            }
            _ => {}
        }
    }

    async fn record_failure(&mut self, peer: PeerId) {
        let mut count = self.failures.entry(peer).or_insert(0);
        *count += 1;
        if *count >= self.unhealthy_threshold {
            warn!(peer = %peer, failures = *count, "peer marked unhealthy, excluding from gossip fan-out");
            self.swarm.behaviour_mut().gossipsub.blacklist_peer(&peer);
        }
    }
}
