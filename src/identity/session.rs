//! In-memory session: the unwrapped private key lives only for the
//! session's lifetime and is zeroized on logout/expiry/shutdown.

use crate::crypto::signing::KeyPair;
use crate::types::now_ms;
use rand::RngCore;
use zeroize::Zeroize;

fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A live login session. `session_id` must never be logged.
pub struct Session {
    pub session_id: String,
    pub username: String,
    keypair: KeyPair,
    pub created_at: u64,
    pub expires_at: u64,
}

impl Session {
    pub fn new(username: &str, keypair: KeyPair, ttl_secs: u64) -> Self {
        let created_at = now_ms();
        Session {
            session_id: generate_session_id(),
            username: username.to_string(),
            keypair,
            created_at,
            expires_at: created_at + ttl_secs * 1000,
        }
    }

    pub fn is_expired(&self) -> bool {
        now_ms() >= self.expires_at
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

/// Metadata returned by `whoami`, deliberately excluding the keypair.
pub struct SessionInfo {
    pub username: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl From<&Session> for SessionInfo {
    fn from(s: &Session) -> Self {
        SessionInfo {
            username: s.username.clone(),
            created_at: s.created_at,
            expires_at: s.expires_at,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let mut id_bytes = std::mem::take(&mut self.session_id).into_bytes();
        id_bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signing::KeyPair;

    #[test]
    fn test_session_not_expired_immediately() {
        let session = Session::new("alice", KeyPair::generate(), 3600);
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_expired_with_zero_ttl() {
        let session = Session::new("alice", KeyPair::generate(), 0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(session.is_expired());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let s1 = Session::new("alice", KeyPair::generate(), 3600);
        let s2 = Session::new("alice", KeyPair::generate(), 3600);
        assert_ne!(s1.session_id, s2.session_id);
    }
}
