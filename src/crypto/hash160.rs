//! HASH160 = RIPEMD160(SHA256(x)), the hash lock primitive shared by both
//! chain adapters. Matches Bitcoin/Zcash script conventions so the source-
//! chain HTLC script and the destination-chain adapter agree bit-for-bit.

use crate::types::Hash160;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    Hash160(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash160_deterministic() {
        let a = hash160(b"swap secret");
        let b = hash160(b"swap secret");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash160_sensitivity() {
        let a = hash160(b"swap secret");
        let b = hash160(b"swap secret!");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash160_known_vector() {
        // HASH160("") = ripemd160(sha256("")) per Bitcoin Script test vectors.
        let h = hash160(b"");
        assert_eq!(
            h.to_hex(),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }
}
