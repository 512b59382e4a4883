//! CLI Firebase auth/session helpers with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use quill_core::auth::{
    resolve_optional_firebase_config, AuthResult, FirebaseAuthClient, SessionPersistence,
};
pub use quill_core::auth::{AuthError, AuthSession};
use quill_core::config::ClientConfig;
use quill_core::Identity;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "quill-cli";

#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    /// One keychain entry per Firebase project
    pub fn new(project_id: &str) -> Self {
        Self {
            username: format!("firebase_session:{project_id}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let store = Self::test_store();
        let guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        if let Some(raw) = guard.get(&self.username) {
            Ok(Some(serde_json::from_str(raw)?))
        } else {
            Ok(None)
        }
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

#[derive(Clone)]
pub struct FirebaseAuthService {
    project_id: String,
    inner: FirebaseAuthClient<SessionStore>,
}

impl FirebaseAuthService {
    /// `None` when the config names no Firebase project
    pub fn from_config(config: &ClientConfig) -> AuthResult<Option<Self>> {
        let Some((project_id, api_key)) =
            resolve_optional_firebase_config(config.project_id(), config.api_key())?
        else {
            return Ok(None);
        };

        let inner = FirebaseAuthClient::new(
            api_key,
            config.auth_base_url().as_deref(),
            SessionStore::new(&project_id),
        )?;
        Ok(Some(Self { project_id, inner }))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        self.inner.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        self.inner.sign_up(email, password).await
    }

    /// Stored session, refreshed when expired
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        self.inner.restore_session().await
    }

    /// Stored session as-is, for use without a network
    pub fn stored_session(&self) -> AuthResult<Option<AuthSession>> {
        load_stored_session(&self.project_id)
    }

    pub async fn lookup_user(&self, session: &AuthSession) -> AuthResult<Identity> {
        self.inner.lookup_user(&session.id_token).await
    }

    pub fn sign_out(&self) -> AuthResult<()> {
        self.inner.sign_out()
    }
}

pub fn load_stored_session(project_id: &str) -> AuthResult<Option<AuthSession>> {
    SessionStore::new(project_id).load_session()
}
