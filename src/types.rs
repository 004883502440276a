//! Core types used throughout BlackTrace

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for orders. Order IDs are unique per node: a
/// timestamp alone is not sufficient across nodes, so a node fingerprint
/// is mixed in — node-local monotonic plus node fingerprint is enough
/// without a cross-node coordination protocol.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderID(pub String);

impl OrderID {
    pub fn generate(node_fingerprint: &str) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis();

        Self(format!("order_{}_{}", timestamp, node_fingerprint))
    }
}

impl fmt::Display for OrderID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for proposals. A taker may issue multiple proposals
/// per order, each with a distinct ProposalID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalID(pub String);

impl ProposalID {
    pub fn generate(node_fingerprint: &str) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis();
        Self(format!("proposal_{}_{}", timestamp, node_fingerprint))
    }
}

impl fmt::Display for ProposalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Peer identifier in P2P network (derived from the node's transport
/// public key, distinct from any user identity).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerID(pub String);

impl PeerID {
    pub fn from_pubkey(pubkey: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(pubkey);
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }
}

impl fmt::Display for PeerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-chain transaction ID (source or destination chain)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxID(pub String);

impl fmt::Display for TxID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Blake2b 256-bit hash wrapper, used for non-protocol-facing hashing
/// (liquidity commitments, nullifiers). HTLC hash locks use [`Hash160`]
/// instead — see its doc comment for why the two must not be conflated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(data);
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result[..32]);
        Hash(hash)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Hash(hash))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// 20-byte HASH160 = RIPEMD160(SHA256(x)) output. This is the hash that
/// crosses the source- and destination-chain HTLC boundary: both adapters
/// MUST derive it identically, which is why it is its own type distinct
/// from the Blake2b-based [`Hash`] used elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash160(pub [u8; 20]);

impl Hash160 {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 20 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&bytes);
        Ok(Hash160(hash))
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Order side. Only makers selling the source asset are supported; a
/// buy-side order book is explicitly out of scope. Kept as an enum
/// (rather than a unit struct) to mirror the capability-set extension
/// pattern used elsewhere, should a buy side ever be added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Sell,
}

/// Destination-asset (stablecoin) kind
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StablecoinType {
    USDC,
    USDT,
    DAI,
}

impl fmt::Display for StablecoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StablecoinType::USDC => "USDC",
            StablecoinType::USDT => "USDT",
            StablecoinType::DAI => "DAI",
        };
        write!(f, "{}", s)
    }
}

/// Zcash network selector; the source-chain adapter uses this to choose
/// network-correct transparent-address version bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZcashNetwork {
    Mainnet,
    Testnet,
}

/// 32-byte secret preimage for the HTLC
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPreimage(pub [u8; 32]);

impl SecretPreimage {
    /// Generate a random secret using a cryptographically strong OS RNG.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        SecretPreimage(secret)
    }

    /// HASH160(secret) — the value published as the HTLC hash lock.
    pub fn hash160(&self) -> Hash160 {
        crate::crypto::hash160::hash160(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes);
        Ok(SecretPreimage(secret))
    }
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_creation() {
        let id1 = OrderID::generate("nodeA");
        assert!(id1.0.starts_with("order_"));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = OrderID::generate("nodeA");
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_peer_id_from_pubkey() {
        let pubkey1 = b"test_public_key_1";
        let pubkey2 = b"test_public_key_2";

        let peer1 = PeerID::from_pubkey(pubkey1);
        let peer2 = PeerID::from_pubkey(pubkey2);

        assert_ne!(peer1, peer2);
        assert_eq!(peer1, PeerID::from_pubkey(pubkey1));
    }

    #[test]
    fn test_hash_consistency() {
        let data = b"test data";
        assert_eq!(Hash::from_bytes(data), Hash::from_bytes(data));
        assert_ne!(Hash::from_bytes(data), Hash::from_bytes(b"different data"));
    }

    #[test]
    fn test_secret_preimage_hash160_deterministic() {
        let secret1 = SecretPreimage::random();
        let secret2 = SecretPreimage::random();
        assert_ne!(secret1, secret2);

        let hash1 = secret1.hash160();
        assert_eq!(hash1, secret1.hash160());
        assert_ne!(hash1, secret2.hash160());
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let data = b"test data";
        let hash = Hash::from_bytes(data);
        let hex = hash.to_hex();
        assert_eq!(hash, Hash::from_hex(&hex).unwrap());
    }

    #[test]
    fn test_hash160_hex_roundtrip() {
        let secret = SecretPreimage::random();
        let h = secret.hash160();
        let hex = h.to_hex();
        assert_eq!(h, Hash160::from_hex(&hex).unwrap());
    }

    #[test]
    fn test_serialization() {
        let order_id = OrderID::generate("nodeA");
        let serialized = serde_json::to_string(&order_id).unwrap();
        let deserialized: OrderID = serde_json::from_str(&serialized).unwrap();
        assert_eq!(order_id, deserialized);
    }
}
