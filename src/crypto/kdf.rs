//! Password-based key derivation and secret-key wrapping
//! (PBKDF2-HMAC-SHA256, >=100k iterations) used to protect the identity
//! secret key at rest.

use crate::error::{BlackTraceError, Result};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::RngCore;
use sha2::Sha256;

pub const PBKDF2_ITERATIONS: u32 = 210_000;
const SALT_LEN: usize = 16;

/// Derive a 32-byte AEAD key from a password and salt.
pub fn derive_key(password: &[u8], salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::<Hmac<Sha256>>(password, salt, PBKDF2_ITERATIONS, &mut key)
        .expect("32 bytes is a valid PBKDF2 output length");
    key
}

/// A password-wrapped secret: random salt, AEAD nonce, and ciphertext.
/// Stored alongside the user's identity file.
pub struct WrappedSecret {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

pub fn wrap_secret(password: &str, secret: &[u8]) -> Result<WrappedSecret> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let key_bytes = derive_key(password.as_bytes(), &salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut rand::rngs::OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, secret)
        .map_err(|_| BlackTraceError::Encryption("AEAD seal failed".into()))?;

    Ok(WrappedSecret {
        salt,
        nonce: nonce.into(),
        ciphertext,
    })
}

pub fn unwrap_secret(password: &str, wrapped: &WrappedSecret) -> Result<Vec<u8>> {
    let key_bytes = derive_key(password.as_bytes(), &wrapped.salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&wrapped.nonce);
    cipher
        .decrypt(nonce, wrapped.ciphertext.as_slice())
        .map_err(|_| BlackTraceError::Decryption("AEAD open failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let secret = [7u8; 32];
        let wrapped = wrap_secret("correct horse battery staple", &secret).unwrap();
        let unwrapped = unwrap_secret("correct horse battery staple", &wrapped).unwrap();
        assert_eq!(unwrapped, secret.to_vec());
    }

    #[test]
    fn test_unwrap_fails_with_wrong_password() {
        let secret = [7u8; 32];
        let wrapped = wrap_secret("correct horse battery staple", &secret).unwrap();
        assert!(unwrap_secret("wrong password", &wrapped).is_err());
    }

    #[test]
    fn test_derive_key_deterministic_per_salt() {
        let salt = [1u8; SALT_LEN];
        let k1 = derive_key(b"hunter2", &salt);
        let k2 = derive_key(b"hunter2", &salt);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_derive_key_differs_across_salts() {
        let k1 = derive_key(b"hunter2", &[1u8; SALT_LEN]);
        let k2 = derive_key(b"hunter2", &[2u8; SALT_LEN]);
        assert_ne!(k1, k2);
    }
}
