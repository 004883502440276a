//! Cryptographic primitives: liquidity commitments, HASH160, signing, ECIES, and KDF.

pub mod commitment;
pub mod ecies;
pub mod hash160;
pub mod kdf;
pub mod signing;
pub mod types;

pub use commitment::{compute_commitment_hash, generate_commitment, generate_nullifier, generate_random_salt, verify_commitment};
pub use types::{CommitmentOpening, LiquidityCommitment, Nullifier};

/// Viewing key: a user's secret scalar used to derive commitments/nullifiers
/// deterministically without revealing the order amount on the wire.
pub type ViewingKey = [u8; 32];

/// Randomness blended into a commitment hash to prevent trial-amount brute force.
pub type Salt = [u8; 32];

/// Marker type naming the commitment construction in use (Blake2b-based, see
/// [`commitment`]). Kept as a unit struct so call sites can reference the
/// scheme by name in logs/errors without a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentScheme;

pub use crate::types::Hash;
