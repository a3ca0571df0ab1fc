use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{file_store::FileBackend, memory_store::MemoryBackend};
use crate::config::StoreConfig;
use crate::error::{Result, SessionError};

/// The Backend trait abstracts string key-value persistence (get, set, remove).
///
/// `set` overwrites unconditionally and `remove` is idempotent. Backends do no
/// network I/O.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A descriptive name for the backend (for logs/debug).
    fn name(&self) -> &str;
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, String>;
    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), String>;
    async fn remove(&self, key: &str) -> std::result::Result<(), String>;
}

/// Creates a concrete backend implementation based on the StoreConfig.
pub async fn create_backend(config: &StoreConfig) -> Result<Arc<dyn Backend>> {
    match config {
        StoreConfig::File(file_config) => {
            let backend = FileBackend::open(&file_config.path)
                .await
                .map_err(SessionError::Storage)?;
            info!(
                "Using file token store at '{}'",
                file_config.path.display()
            );
            Ok(Arc::new(backend))
        }
        StoreConfig::Memory => {
            info!("Using in-memory token store; the session will not survive a restart.");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}
