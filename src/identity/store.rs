//! Identity & session store: register/login/whoami/logout.

use super::session::{Session, SessionInfo};
use super::user::User;
use crate::error::{BlackTraceError, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};

pub struct IdentityStore {
    identity_dir: PathBuf,
    session_ttl_secs: u64,
    sessions: DashMap<String, Session>,
}

impl IdentityStore {
    pub fn new(identity_dir: impl AsRef<Path>, session_ttl_secs: u64) -> Result<Self> {
        let identity_dir = identity_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&identity_dir)?;
        Ok(IdentityStore {
            identity_dir,
            session_ttl_secs,
            sessions: DashMap::new(),
        })
    }

    fn user_path(&self, username: &str) -> PathBuf {
        self.identity_dir.join(format!("{}.json", username))
    }

    pub fn register(&self, username: &str, password: &str) -> Result<()> {
        let path = self.user_path(username);
        if path.exists() {
            return Err(BlackTraceError::UserExists(username.to_string()));
        }

        let (user, _keypair) = User::register(username, password)?;
        let json = serde_json::to_vec_pretty(&user)?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let path = self.user_path(username);
        if !path.exists() {
            return Err(BlackTraceError::UnknownUser(username.to_string()));
        }

        let raw = std::fs::read(&path)?;
        let user: User = serde_json::from_slice(&raw)?;
        let keypair = user.unwrap_privkey(password)?;

        let session = Session::new(username, keypair, self.session_ttl_secs);
        let session_id = session.session_id.clone();
        self.sessions.insert(session_id.clone(), session);
        Ok(session_id)
    }

    pub fn whoami(&self, session_id: &str) -> Result<SessionInfo> {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or(BlackTraceError::NoSession)?;

        if entry.is_expired() {
            drop(entry);
            self.sessions.remove(session_id);
            return Err(BlackTraceError::Expired);
        }

        Ok(SessionInfo::from(&*entry))
    }

    pub fn logout(&self, session_id: &str) -> Result<()> {
        self.sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or(BlackTraceError::NoSession)
    }

    /// Returns the keypair for an active, unexpired session, for use by
    /// other components (signing envelopes, sealing payloads).
    pub fn with_session<F, T>(&self, session_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Session) -> T,
    {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or(BlackTraceError::NoSession)?;
        if entry.is_expired() {
            drop(entry);
            self.sessions.remove(session_id);
            return Err(BlackTraceError::Expired);
        }
        Ok(f(&entry))
    }

    pub fn load_pubkey(&self, username: &str) -> Result<Vec<u8>> {
        let path = self.user_path(username);
        let raw = std::fs::read(&path)
            .map_err(|_| BlackTraceError::UnknownUser(username.to_string()))?;
        let user: User = serde_json::from_slice(&raw)?;
        Ok(user.pubkey)
    }

    /// Zero all in-memory sessions; called on shutdown.
    pub fn clear_all_sessions(&self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> IdentityStore {
        let dir = std::env::temp_dir().join(format!("blacktrace-test-{}", crate::types::now_ms()));
        IdentityStore::new(dir, 3600).unwrap()
    }

    #[test]
    fn test_register_then_login() {
        let store = temp_store();
        store.register("alice", "pw-a").unwrap();
        let session_id = store.login("alice", "pw-a").unwrap();
        assert!(store.whoami(&session_id).is_ok());
    }

    #[test]
    fn test_register_duplicate_fails() {
        let store = temp_store();
        store.register("alice", "pw-a").unwrap();
        let result = store.register("alice", "pw-b");
        assert!(matches!(result, Err(BlackTraceError::UserExists(_))));
    }

    #[test]
    fn test_login_unknown_user() {
        let store = temp_store();
        let result = store.login("nobody", "pw");
        assert!(matches!(result, Err(BlackTraceError::UnknownUser(_))));
    }

    #[test]
    fn test_login_wrong_password() {
        let store = temp_store();
        store.register("alice", "pw-a").unwrap();
        let result = store.login("alice", "wrong");
        assert!(matches!(result, Err(BlackTraceError::WrongPassword)));
    }

    #[test]
    fn test_logout_removes_session() {
        let store = temp_store();
        store.register("alice", "pw-a").unwrap();
        let session_id = store.login("alice", "pw-a").unwrap();
        store.logout(&session_id).unwrap();
        assert!(matches!(store.whoami(&session_id), Err(BlackTraceError::NoSession)));
    }

    #[test]
    fn test_whoami_unknown_session() {
        let store = temp_store();
        assert!(matches!(store.whoami("nonexistent"), Err(BlackTraceError::NoSession)));
    }
}
