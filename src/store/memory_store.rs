use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Backend;

/// A backend that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), String> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_overwrites_and_remove_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.set("access", "T1").await.unwrap();
        backend.set("access", "T2").await.unwrap();
        assert_eq!(backend.get("access").await.unwrap().as_deref(), Some("T2"));

        backend.remove("access").await.unwrap();
        backend.remove("access").await.unwrap();
        assert_eq!(backend.get("access").await.unwrap(), None);
    }
}
