//! End-to-end scenario tests wiring the order book, negotiation engine,
//! settlement coordinator, and a fake chain connector together the way
//! the node controller does, without the transport layer. Grounded on
//! `coordinator.rs`'s own `new_in_memory` test style and
//! `chain::connector::test_double::FakeChainConnector`.
//!
//! These fake-chain timeouts are small synthetic clock units, not the
//! real epoch-second values a `SettlementRecord` carries — matching the
//! convention `chain::connector`'s own tests already use. Coupling
//! `FakeChainConnector`'s deterministic clock to real wall-clock
//! timestamps would make these tests either flaky or require sleeping
//! for real hours.

use crate::chain::connector::test_double::FakeChainConnector;
use crate::chain::{ChainConnector, LockParams};
use crate::negotiation::NegotiationEngine;
use crate::orderbook::OrderBook;
use crate::settlement::{InternalBus, SettlementCoordinator, SettlementStatus};
use crate::types::{OrderID, PeerID, ProposalID, StablecoinType};
use std::sync::Arc;

struct Fixture {
    book: OrderBook,
    negotiation: NegotiationEngine,
    settlement: SettlementCoordinator,
    bus: Arc<InternalBus>,
    maker_peer: PeerID,
    taker_peer: PeerID,
    order_id: OrderID,
}

async fn setup_accepted_proposal(price: u64) -> (Fixture, ProposalID, u64, u64) {
    let book = OrderBook::new();
    let negotiation = NegotiationEngine::new();
    let bus = Arc::new(InternalBus::new());
    let settlement = SettlementCoordinator::new_in_memory(bus.clone());

    let maker_peer = PeerID("alice_node".to_string());
    let taker_peer = PeerID("bob_node".to_string());

    let order_id = book
        .create(
            "nodeA",
            maker_peer.clone(),
            "alice",
            "ZEC",
            StablecoinType::USDC,
            10000,
            450,
            470,
            b"alice_viewing_key",
            3600,
            None,
        )
        .unwrap();

    let proposal = negotiation
        .propose(ProposalID::generate("nodeB"), order_id.clone(), taker_peer.clone(), "bob", price, 10000, 450, 470, vec![])
        .await
        .unwrap();

    // Mirrors the maker's order book moving to `Negotiating` on receipt
    // of the wire proposal, ahead of `accept`.
    book.mark_negotiating(&order_id).await.unwrap();
    negotiation.accept(&order_id, &proposal.proposal_id).await.unwrap();
    book.mark_settling(&order_id).await.unwrap();

    let amount = proposal.amount;
    let amount_dest = proposal.amount * proposal.price;
    let proposal_id = proposal.proposal_id.clone();

    let fixture = Fixture { book, negotiation, settlement, bus, maker_peer, taker_peer, order_id };
    (fixture, proposal_id, amount, amount_dest)
}

/// S1: Alice creates an order, Bob proposes 460 x 10000, Alice accepts.
/// Both sides lock, Alice claims dest with the secret, Bob's watcher
/// extracts the secret and claims source. Final status is `Complete`
/// with no refund path exercised.
#[tokio::test]
async fn test_s1_happy_path_both_sides_claim() {
    let (fx, proposal_id, amount, amount_dest) = setup_accepted_proposal(460).await;
    assert_eq!(fx.negotiation.accepted_proposal(&fx.order_id).unwrap().price, 460);

    let record = fx
        .settlement
        .begin_settlement(proposal_id.clone(), fx.order_id.clone(), fx.maker_peer.clone(), fx.taker_peer.clone(), amount, amount_dest)
        .unwrap();
    let secret = record.secret.unwrap();

    let source_chain = FakeChainConnector::new();
    let dest_chain = FakeChainConnector::new();

    let source_lock = source_chain
        .lock(LockParams { sender: "alice".to_string(), receiver: "bob".to_string(), amount, hash_lock: record.hash, absolute_timeout: 200 })
        .await
        .unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::MakerLocked).unwrap();
    fx.settlement.set_lock_txid(&proposal_id, Some(source_lock.lock_txid.clone()), None).unwrap();

    let dest_lock = dest_chain
        .lock(LockParams { sender: "bob".to_string(), receiver: "alice".to_string(), amount: amount_dest, hash_lock: record.hash, absolute_timeout: 100 })
        .await
        .unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::TakerLocked).unwrap();
    fx.settlement.set_lock_txid(&proposal_id, None, Some(dest_lock.lock_txid.clone())).unwrap();

    let mut secret_rx = fx.bus.subscribe_secret(&proposal_id);
    fx.settlement.transition(&proposal_id, SettlementStatus::BothLocked).unwrap();
    let revealed = secret_rx.try_recv().unwrap();
    assert_eq!(revealed.secret, secret);

    // Alice claims the destination-chain HTLC with the revealed secret.
    dest_chain.claim(&dest_lock.htlc_ref, secret).await.unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::MakerClaimed).unwrap();

    // Bob's watcher sees the claim and extracts the secret to claim source.
    let watched = dest_chain.watch(&dest_lock.htlc_ref).await.unwrap();
    let extracted = match watched {
        crate::chain::WatchEvent::Claimed { secret } => secret,
        other => panic!("expected Claimed, got {other:?}"),
    };
    assert_eq!(extracted, secret);
    source_chain.claim(&source_lock.htlc_ref, extracted).await.unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::TakerClaimed).unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::Complete).unwrap();

    assert_eq!(fx.settlement.get(&proposal_id).unwrap().status, SettlementStatus::Complete);
    fx.book.mark_done(&fx.order_id).await.unwrap();
}

/// S2: Alice locks source, Bob never locks dest. Once past the source
/// timeout Alice's refund succeeds and the record ends `Refunded`.
#[tokio::test]
async fn test_s2_taker_never_locks_maker_refunds() {
    let (fx, proposal_id, amount, amount_dest) = setup_accepted_proposal(460).await;

    let record = fx
        .settlement
        .begin_settlement(proposal_id.clone(), fx.order_id.clone(), fx.maker_peer.clone(), fx.taker_peer.clone(), amount, amount_dest)
        .unwrap();

    let source_chain = FakeChainConnector::new();
    let source_lock = source_chain
        .lock(LockParams { sender: "alice".to_string(), receiver: "bob".to_string(), amount, hash_lock: record.hash, absolute_timeout: 200 })
        .await
        .unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::MakerLocked).unwrap();
    fx.settlement.set_lock_txid(&proposal_id, Some(source_lock.lock_txid.clone()), None).unwrap();

    // Bob never locks dest. Past the source timeout, Alice refunds.
    source_chain.advance_time(250);
    let refund_txid = source_chain.refund(&source_lock.htlc_ref).await.unwrap();
    assert!(refund_txid.ends_with("_refund_tx"));

    fx.settlement.transition(&proposal_id, SettlementStatus::Refunded).unwrap();

    let final_record = fx.settlement.get(&proposal_id).unwrap();
    assert_eq!(final_record.status, SettlementStatus::Refunded);
    assert!(final_record.dest_lock_txid.is_none());
}

/// S3: both lock, but Alice never claims dest. Bob refunds dest once its
/// timeout passes, then Alice refunds source once its (later) timeout
/// passes. Final status is `Refunded`.
#[tokio::test]
async fn test_s3_maker_aborts_both_refund() {
    let (fx, proposal_id, amount, amount_dest) = setup_accepted_proposal(460).await;

    let record = fx
        .settlement
        .begin_settlement(proposal_id.clone(), fx.order_id.clone(), fx.maker_peer.clone(), fx.taker_peer.clone(), amount, amount_dest)
        .unwrap();

    let source_chain = FakeChainConnector::new();
    let dest_chain = FakeChainConnector::new();

    let source_lock = source_chain
        .lock(LockParams { sender: "alice".to_string(), receiver: "bob".to_string(), amount, hash_lock: record.hash, absolute_timeout: 200 })
        .await
        .unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::MakerLocked).unwrap();

    let dest_lock = dest_chain
        .lock(LockParams { sender: "bob".to_string(), receiver: "alice".to_string(), amount: amount_dest, hash_lock: record.hash, absolute_timeout: 100 })
        .await
        .unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::TakerLocked).unwrap();
    fx.settlement.transition(&proposal_id, SettlementStatus::BothLocked).unwrap();

    // Alice never claims. Past dest's (shorter) timeout, Bob refunds dest.
    dest_chain.advance_time(150);
    dest_chain.refund(&dest_lock.htlc_ref).await.unwrap();

    // Past source's (longer) timeout, Alice refunds source.
    source_chain.advance_time(250);
    source_chain.refund(&source_lock.htlc_ref).await.unwrap();

    fx.settlement.transition(&proposal_id, SettlementStatus::Refunded).unwrap();
    assert_eq!(fx.settlement.get(&proposal_id).unwrap().status, SettlementStatus::Refunded);
}
