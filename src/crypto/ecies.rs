//! ECIES: ephemeral ECDH over secp256k1, HKDF-SHA256 key derivation, and
//! ChaCha20-Poly1305 sealing. Used to encrypt order details/proposals so
//! only the intended counterparty can read them.

use crate::error::{BlackTraceError, Result};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use secp256k1::ecdh::SharedSecret;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const HKDF_INFO: &[u8] = b"blacktrace-ecies-v1";

/// Ciphertext produced by [`seal`]: the sender's ephemeral public key plus
/// the AEAD nonce and tagged ciphertext, all of which travel on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedMessage {
    pub ephemeral_pubkey: [u8; 33],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

fn derive_key(shared: &SharedSecret) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, shared.as_ref());
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .expect("32 bytes is a valid HKDF output length");
    key
}

/// Encrypt `plaintext` for `recipient_pubkey` using a freshly generated
/// ephemeral keypair.
pub fn seal(recipient_pubkey: &PublicKey, plaintext: &[u8]) -> Result<SealedMessage> {
    let secp = Secp256k1::new();
    let mut rng = rand::rngs::OsRng;
    let (ephemeral_secret, ephemeral_public) = secp.generate_keypair(&mut rng);

    let shared = SharedSecret::new(recipient_pubkey, &ephemeral_secret);
    let key_bytes = derive_key(&shared);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut rand::rngs::OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| BlackTraceError::Encryption("AEAD seal failed".into()))?;

    Ok(SealedMessage {
        ephemeral_pubkey: ephemeral_public.serialize(),
        nonce: nonce.into(),
        ciphertext,
    })
}

/// Decrypt a [`SealedMessage`] using the recipient's static secret key.
pub fn open(recipient_secret: &SecretKey, sealed: &SealedMessage) -> Result<Vec<u8>> {
    let ephemeral_public = PublicKey::from_slice(&sealed.ephemeral_pubkey)
        .map_err(|_| BlackTraceError::Decryption("AEAD open failed".into()))?;

    let shared = SharedSecret::new(&ephemeral_public, recipient_secret);
    let key_bytes = derive_key(&shared);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&sealed.nonce);
    cipher
        .decrypt(nonce, sealed.ciphertext.as_slice())
        .map_err(|_| BlackTraceError::Decryption("AEAD open failed".into()))
}

/// Seal `plaintext` for `recipient_pubkey` and return the wire-ready bytes,
/// for call sites that just want an opaque `payload`/`encrypted_payload`.
pub fn seal_bytes(recipient_pubkey: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let sealed = seal(recipient_pubkey, plaintext)?;
    Ok(serde_json::to_vec(&sealed)?)
}

/// Inverse of [`seal_bytes`].
pub fn open_bytes(recipient_secret: &SecretKey, bytes: &[u8]) -> Result<Vec<u8>> {
    let sealed: SealedMessage = serde_json::from_slice(bytes)?;
    open(recipient_secret, &sealed)
}
