//! Persisted user identity: one AEAD-wrapped file per user.

use crate::crypto::kdf::{self, WrappedSecret, PBKDF2_ITERATIONS};
use crate::crypto::{hash160, signing::KeyPair};
use crate::error::{BlackTraceError, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KdfParams {
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

/// On-disk representation of a registered user. `pubkey_hash = HASH160(pubkey)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub encrypted_privkey: Vec<u8>,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub kdf_params: KdfParams,
    pub pubkey: Vec<u8>,
    pub pubkey_hash: String,
}

impl User {
    /// Register a new identity: generate a keypair, wrap the private key
    /// under the password, and produce the on-disk record.
    pub fn register(username: &str, password: &str) -> Result<(Self, KeyPair)> {
        let keypair = KeyPair::generate();
        let secret_bytes = keypair.secret_bytes();
        let wrapped = kdf::wrap_secret(password, &secret_bytes)?;
        let pubkey = keypair.public_key_bytes().to_vec();
        let pubkey_hash = hash160::hash160(&pubkey).to_hex();

        let user = User {
            username: username.to_string(),
            encrypted_privkey: wrapped.ciphertext,
            salt: wrapped.salt.to_vec(),
            nonce: wrapped.nonce.to_vec(),
            kdf_params: KdfParams::default(),
            pubkey,
            pubkey_hash,
        };

        Ok((user, keypair))
    }

    /// Unwrap the private key given the correct password.
    pub fn unwrap_privkey(&self, password: &str) -> Result<KeyPair> {
        let mut salt = [0u8; 16];
        if self.salt.len() != 16 {
            return Err(BlackTraceError::StateCorruption(
                "user record salt must be 16 bytes".to_string(),
            ));
        }
        salt.copy_from_slice(&self.salt);

        let mut nonce = [0u8; 12];
        if self.nonce.len() != 12 {
            return Err(BlackTraceError::StateCorruption(
                "user record nonce must be 12 bytes".to_string(),
            ));
        }
        nonce.copy_from_slice(&self.nonce);

        let wrapped = WrappedSecret {
            salt,
            nonce,
            ciphertext: self.encrypted_privkey.clone(),
        };

        let secret_bytes = kdf::unwrap_secret(password, &wrapped).map_err(|_| BlackTraceError::WrongPassword)?;
        KeyPair::from_secret_bytes(&secret_bytes)
    }

    pub fn verify_pubkey_hash(&self) -> bool {
        hash160::hash160(&self.pubkey).to_hex() == self.pubkey_hash
    }
}
