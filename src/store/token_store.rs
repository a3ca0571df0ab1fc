use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::Backend;
use crate::error::{Result, SessionError};
use crate::models::{CredentialPair, UserProfile};

pub const ACCESS_KEY: &str = "access";
pub const REFRESH_KEY: &str = "refresh";
pub const USER_KEY: &str = "user";

/// Persists the access token, the refresh token and the cached profile.
///
/// Every operation runs under one async lock, so compound operations such as
/// [`TokenStore::clear_session`] are atomic to all callers even on a
/// multi-threaded runtime. Access and refresh tokens are always written and
/// cleared together.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn Backend>,
    lock: Arc<Mutex<()>>,
}

fn storage_err(e: String) -> SessionError {
    SessionError::Storage(e)
}

impl TokenStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        TokenStore {
            backend,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// A store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(super::MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        self.backend.get(key).await.map_err(storage_err)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.backend.set(key, value).await.map_err(storage_err)
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.backend.remove(key).await.map_err(storage_err)
    }

    pub async fn access_token(&self) -> Result<Option<String>> {
        self.get(ACCESS_KEY).await
    }

    pub async fn refresh_token(&self) -> Result<Option<String>> {
        self.get(REFRESH_KEY).await
    }

    /// The serialized profile exactly as stored, sentinel values included.
    pub async fn cached_profile_raw(&self) -> Result<Option<String>> {
        self.get(USER_KEY).await
    }

    /// Removes tokens and the cached profile.
    pub async fn clear_session(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.remove_session().await
    }

    /// Clears the session only while the stored refresh token is still
    /// `expected_refresh`. Returns false when a newer session (or none) is
    /// stored, leaving it untouched.
    pub async fn clear_session_if(&self, expected_refresh: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let current = self.backend.get(REFRESH_KEY).await.map_err(storage_err)?;
        if current.as_deref() != Some(expected_refresh) {
            return Ok(false);
        }
        self.remove_session().await?;
        Ok(true)
    }

    async fn remove_session(&self) -> Result<()> {
        // Refresh goes first so an interrupted clear never leaves a refresh
        // token without its access token.
        for key in [REFRESH_KEY, ACCESS_KEY, USER_KEY] {
            self.backend.remove(key).await.map_err(storage_err)?;
        }
        debug!("Cleared stored session");
        Ok(())
    }

    pub async fn save_credentials(&self, credentials: &CredentialPair) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_credentials(credentials).await
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let serialized = serde_json::to_string(profile)?;
        self.set(USER_KEY, &serialized).await
    }

    /// Stores tokens and profile in one step, as registration returns them.
    pub async fn save_session(
        &self,
        credentials: &CredentialPair,
        profile: &UserProfile,
    ) -> Result<()> {
        let serialized = serde_json::to_string(profile)?;
        let _guard = self.lock.lock().await;
        self.write_credentials(credentials).await?;
        self.backend
            .set(USER_KEY, &serialized)
            .await
            .map_err(storage_err)
    }

    /// Writes a refreshed access token, but only while the stored refresh
    /// token is still `expected_refresh`. Returns false (and writes nothing)
    /// when the session was cleared or replaced in the meantime.
    pub async fn replace_access_token(
        &self,
        expected_refresh: &str,
        new_access: &str,
        rotated_refresh: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let current = self.backend.get(REFRESH_KEY).await.map_err(storage_err)?;
        if current.as_deref() != Some(expected_refresh) {
            return Ok(false);
        }
        self.backend
            .set(ACCESS_KEY, new_access)
            .await
            .map_err(storage_err)?;
        if let Some(refresh) = rotated_refresh {
            self.backend
                .set(REFRESH_KEY, refresh)
                .await
                .map_err(storage_err)?;
        }
        Ok(true)
    }

    async fn write_credentials(&self, credentials: &CredentialPair) -> Result<()> {
        self.backend
            .set(ACCESS_KEY, &credentials.access)
            .await
            .map_err(storage_err)?;
        self.backend
            .set(REFRESH_KEY, &credentials.refresh)
            .await
            .map_err(storage_err)
    }
}
