use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where tokens and the cached profile are persisted. We differentiate the
/// backends via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// A JSON file that survives restarts.
    #[serde(rename = "file")]
    File(FileStoreConfig),
    /// Process-local only; the session is lost on exit.
    #[serde(rename = "memory")]
    Memory,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct FileStoreConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".jobdesk").join("session.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File(FileStoreConfig {
            path: default_session_path(),
        })
    }
}
