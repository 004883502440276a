//! Wire codec: a single signed envelope carries all node-to-node
//! traffic, as one outer type with a `type` discriminant.

use crate::crypto::signing::{self, KeyPair};
use crate::error::{BlackTraceError, Result};
use crate::types::{now_ms, PeerID};
use dashmap::DashMap;
use secp256k1::{ecdsa::Signature, PublicKey};
use serde::{Deserialize, Serialize};

const REPLAY_WINDOW_MS: u64 = 5 * 60 * 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    OrderAnnounce,
    OrderRequest,
    OrderDetails,
    Proposal,
    Accept,
    Reject,
    StatusUpdate,
}

/// The signed wire envelope. Signature covers `type||timestamp||
/// signer_pubkey||payload`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub timestamp: i64,
    pub signer_pubkey: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Envelope {
    fn signing_digest(kind: &MessageType, timestamp: i64, signer_pubkey: &[u8], payload: &[u8]) -> [u8; 32] {
        let mut buf = Vec::new();
        buf.extend_from_slice(&serde_json::to_vec(kind).expect("MessageType always serializes"));
        buf.extend_from_slice(&timestamp.to_be_bytes());
        buf.extend_from_slice(signer_pubkey);
        buf.extend_from_slice(payload);
        signing::digest(&buf)
    }

    /// Build and sign an envelope over `payload` using `keypair`.
    pub fn seal(kind: MessageType, payload: Vec<u8>, keypair: &KeyPair) -> Result<Self> {
        let timestamp = now_ms() as i64;
        let signer_pubkey = keypair.public_key_bytes().to_vec();
        let digest = Self::signing_digest(&kind, timestamp, &signer_pubkey, &payload);
        let signature = keypair.sign(&digest)?;

        Ok(Envelope {
            kind,
            timestamp,
            signer_pubkey,
            payload,
            signature: signature.serialize_compact().to_vec(),
        })
    }

    /// Verify the envelope's signature over its own fields.
    pub fn verify_signature(&self) -> bool {
        let digest = Self::signing_digest(&self.kind, self.timestamp, &self.signer_pubkey, &self.payload);

        let public_key = match PublicKey::from_slice(&self.signer_pubkey) {
            Ok(pk) => pk,
            Err(_) => return false,
        };

        let signature = match Signature::from_compact(&self.signature) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        signing::verify(&public_key, &digest, &signature)
    }

    pub fn is_within_replay_window(&self) -> bool {
        let now = now_ms() as i64;
        (now - self.timestamp).unsigned_abs() <= REPLAY_WINDOW_MS
    }
}

/// Caches the first-seen signer pubkey per peer and flags a later mismatch
/// as `PeerKeyChanged` — a peer's key is pinned for life, never silently
/// rotated.
#[derive(Default)]
pub struct PeerKeyCache {
    keys: DashMap<PeerID, Vec<u8>>,
}

impl PeerKeyCache {
    pub fn new() -> Self {
        PeerKeyCache {
            keys: DashMap::new(),
        }
    }

    /// Return the pinned pubkey for `peer`, if any has been seen yet —
    /// used to look up a counterparty's ECIES recipient key.
    pub fn get(&self, peer: &PeerID) -> Option<Vec<u8>> {
        self.keys.get(peer).map(|entry| entry.value().clone())
    }

    /// Pin or check `pubkey` against the cached key for `peer`.
    pub fn check_and_pin(&self, peer: &PeerID, pubkey: &[u8]) -> Result<()> {
        match self.keys.get(peer) {
            Some(existing) => {
                if existing.value().as_slice() == pubkey {
                    Ok(())
                } else {
                    Err(BlackTraceError::PeerKeyChanged(peer.0.clone()))
                }
            }
            None => {
                self.keys.insert(peer.clone(), pubkey.to_vec());
                Ok(())
            }
        }
    }
}

/// Receive-side validation pipeline: signature, replay window, peer-key
/// pinning. Returns the validated envelope or the precise drop reason.
pub fn validate_incoming(envelope: &Envelope, from_peer: &PeerID, cache: &PeerKeyCache) -> Result<()> {
    if !envelope.verify_signature() {
        return Err(BlackTraceError::BadSignature);
    }
    if !envelope.is_within_replay_window() {
        return Err(BlackTraceError::BadSignature);
    }
    cache.check_and_pin(from_peer, &envelope.signer_pubkey)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_verify_roundtrip() {
        let kp = KeyPair::generate();
        let envelope = Envelope::seal(MessageType::OrderAnnounce, b"payload".to_vec(), &kp).unwrap();
        assert!(envelope.verify_signature());
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let kp = KeyPair::generate();
        let mut envelope = Envelope::seal(MessageType::OrderAnnounce, b"payload".to_vec(), &kp).unwrap();
        envelope.payload = b"tampered".to_vec();
        assert!(!envelope.verify_signature());
    }

    #[test]
    fn test_replay_window_rejects_old_timestamp() {
        let kp = KeyPair::generate();
        let mut envelope = Envelope::seal(MessageType::Proposal, b"p".to_vec(), &kp).unwrap();
        envelope.timestamp -= (REPLAY_WINDOW_MS as i64) + 1000;
        assert!(!envelope.is_within_replay_window());
    }

    #[test]
    fn test_peer_key_cache_pins_first_key() {
        let cache = PeerKeyCache::new();
        let peer = PeerID("peer1".to_string());
        assert!(cache.check_and_pin(&peer, b"key1").is_ok());
        assert!(cache.check_and_pin(&peer, b"key1").is_ok());
    }

    #[test]
    fn test_peer_key_cache_get_returns_pinned_key() {
        let cache = PeerKeyCache::new();
        let peer = PeerID("peer1".to_string());
        assert!(cache.get(&peer).is_none());
        cache.check_and_pin(&peer, b"key1").unwrap();
        assert_eq!(cache.get(&peer), Some(b"key1".to_vec()));
    }

    #[test]
    fn test_peer_key_cache_flags_mismatch() {
        let cache = PeerKeyCache::new();
        let peer = PeerID("peer1".to_string());
        cache.check_and_pin(&peer, b"key1").unwrap();
        let result = cache.check_and_pin(&peer, b"key2");
        assert!(matches!(result, Err(BlackTraceError::PeerKeyChanged(_))));
    }

    #[test]
    fn test_validate_incoming_end_to_end() {
        let kp = KeyPair::generate();
        let envelope = Envelope::seal(MessageType::Accept, b"terms".to_vec(), &kp).unwrap();
        let cache = PeerKeyCache::new();
        let peer = PeerID("peer1".to_string());
        assert!(validate_incoming(&envelope, &peer, &cache).is_ok());
    }
}
