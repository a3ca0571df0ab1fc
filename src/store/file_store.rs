//! File-backed token persistence.
//!
//! Entries live in a single flat JSON object:
//!
//! ```json
//! {
//!   "access": "eyJhbGciOi...",
//!   "refresh": "eyJhbGciOi...",
//!   "user": "{\"id\":1,\"username\":\"alice\"}"
//! }
//! ```
//!
//! The file is rewritten after every mutation and, on Unix, restricted to
//! mode 0600.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::Backend;

pub struct FileBackend {
    path: PathBuf,
    /// In-memory copy of the file contents.
    cache: Mutex<BTreeMap<String, String>>,
}

impl FileBackend {
    /// Opens the store at `path`. A missing file is an empty store; a file
    /// that cannot be read or parsed is an error.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();
        let cache = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                format!(
                    "Corrupted session file '{}': {}. Delete it and log in again.",
                    path.display(),
                    e
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at '{}' yet", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                return Err(format!(
                    "Cannot read session file '{}': {}",
                    path.display(),
                    e
                ))
            }
        };

        Ok(FileBackend {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save_to_disk(&self, entries: &BTreeMap<String, String>) -> Result<(), String> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Cannot create '{}': {}", parent.display(), e))?;
        }

        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| format!("Failed to serialize session: {}", e))?;

        // Write a sibling file and rename it over the old one so a crash never
        // leaves a truncated session behind.
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents)
            .await
            .map_err(|e| format!("Cannot write '{}': {}", tmp_path.display(), e))?;
        restrict_permissions(&tmp_path).await?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| format!("Cannot replace '{}': {}", self.path.display(), e))
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| format!("Cannot restrict permissions on '{}': {}", path.display(), e))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), String> {
    Ok(())
}

#[async_trait]
impl Backend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.cache.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut cache = self.cache.lock().await;
        cache.insert(key.to_string(), value.to_string());
        self.save_to_disk(&cache).await
    }

    async fn remove(&self, key: &str) -> Result<(), String> {
        let mut cache = self.cache.lock().await;
        if cache.remove(key).is_none() {
            return Ok(());
        }
        self.save_to_disk(&cache).await
    }
}
