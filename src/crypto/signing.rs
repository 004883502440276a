//! ECDSA identity keys over secp256k1, fixed per deployment. Used for
//! user identity signatures on envelopes and for source-chain spending
//! keys — see DESIGN.md for why the two share a curve.

use crate::error::{BlackTraceError, Result};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

/// A secp256k1 keypair. The secret scalar is held in a `Zeroizing` buffer
/// so it is actually scrubbed on drop, not just a stack copy of it;
/// callers must not clone it out into a non-zeroizing container.
pub struct KeyPair {
    secret_key: Zeroizing<[u8; 32]>,
    pub public_key: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = rand::rngs::OsRng;
        let (secret_key, public_key) = secp.generate_keypair(&mut rng);
        KeyPair {
            secret_key: Zeroizing::new(secret_key.secret_bytes()),
            public_key,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|_| BlackTraceError::InvalidSecret)?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(KeyPair {
            secret_key: Zeroizing::new(secret_key.secret_bytes()),
            public_key,
        })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        *self.secret_key
    }

    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    /// Sign a 32-byte message digest (callers hash the payload first —
    /// see [`digest`]).
    pub fn sign(&self, digest: &[u8; 32]) -> Result<Signature> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&*self.secret_key).map_err(|_| BlackTraceError::InvalidSecret)?;
        let message = Message::from_digest(*digest);
        Ok(secp.sign_ecdsa(&message, &secret_key))
    }
}

/// Blake2b-256 digest of an arbitrary payload, suitable as a signing input.
pub fn digest(data: &[u8]) -> [u8; 32] {
    use blake2::{Blake2b512, Digest as _};
    let mut hasher = Blake2b512::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result[..32]);
    out
}

pub fn verify(public_key: &PublicKey, digest: &[u8; 32], signature: &Signature) -> bool {
    let secp = Secp256k1::new();
    let message = Message::from_digest(*digest);
    secp.verify_ecdsa(&message, signature, public_key).is_ok()
}

pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_slice(bytes).map_err(|_| BlackTraceError::InvalidSecret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let kp = KeyPair::generate();
        let d = digest(b"settlement terms");
        let sig = kp.sign(&d).unwrap();
        assert!(verify(&kp.public_key, &d, &sig));
    }

    #[test]
    fn test_verify_rejects_tampered_digest() {
        let kp = KeyPair::generate();
        let d = digest(b"settlement terms");
        let sig = kp.sign(&d).unwrap();
        let other = digest(b"different terms");
        assert!(!verify(&kp.public_key, &other, &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let d = digest(b"settlement terms");
        let sig = kp1.sign(&d).unwrap();
        assert!(!verify(&kp2.public_key, &d, &sig));
    }

    #[test]
    fn test_from_secret_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let bytes = kp.secret_bytes();
        let kp2 = KeyPair::from_secret_bytes(&bytes).unwrap();
        assert_eq!(kp.public_key, kp2.public_key);
    }
}
