use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::StoreConfig;
use crate::error::{Result, SessionError};

/// Prefix for environment overrides, e.g. `JOBDESK_API__BASE_URL`.
pub const ENV_PREFIX: &str = "JOBDESK_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: remote API, token persistence and logging.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Location of the job-board API and the paths of its auth endpoints.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Per-request timeout enforced by the HTTP transport. None means no limit.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            endpoints: EndpointsConfig::default(),
            request_timeout_ms: None,
        }
    }
}

impl ApiConfig {
    /// Config pointing at `base_url` with default endpoints. Handy for tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        ApiConfig {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct EndpointsConfig {
    pub login: String,
    /// Never retried through a refresh, whatever status it returns.
    pub refresh: String,
    pub register: String,
    pub profile: String,
    pub jobs: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        EndpointsConfig {
            login: "/auth/login/".to_string(),
            refresh: "/auth/token/refresh/".to_string(),
            register: "/auth/register/".to_string(),
            profile: "/auth/profile/".to_string(),
            jobs: "/jobs/".to_string(),
        }
    }
}

fn figment_for(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(Config::ConfigV1(ConfigV1::default())))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from a YAML file, layered over defaults and under
/// `JOBDESK_*` environment overrides. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigV1> {
    extract(figment_for(path.as_ref()))
}

/// Load config from an in-memory YAML document (no environment overrides).
pub fn load_config_str(yaml: &str) -> Result<ConfigV1> {
    extract(
        Figment::from(Serialized::defaults(Config::ConfigV1(ConfigV1::default())))
            .merge(Yaml::string(yaml)),
    )
}

fn extract(figment: Figment) -> Result<ConfigV1> {
    match figment.extract::<Config>() {
        Ok(Config::ConfigV1(c)) => Ok(c),
        Err(e) => Err(SessionError::Config(e.to_string())),
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<()> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[test]
    fn empty_document_uses_defaults() {
        let config = load_config_str("version: \"1.0.0\"\n").unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000/api");
        assert_eq!(config.api.endpoints.refresh, "/auth/token/refresh/");
        assert_eq!(config.logging.level, "info");
        assert!(matches!(config.store, StoreConfig::File(_)));
    }

    #[test]
    fn yaml_overrides_nested_values() {
        let yaml = r#"
version: "1.0.0"
api:
  base_url: https://jobs.example.com/api
  request_timeout_ms: 5000
  endpoints:
    refresh: /auth/refresh/
store:
  type: memory
logging:
  level: debug
  format: json
"#;
        let config = load_config_str(yaml).unwrap();
        assert_eq!(config.api.base_url, "https://jobs.example.com/api");
        assert_eq!(config.api.request_timeout_ms, Some(5000));
        assert_eq!(config.api.endpoints.refresh, "/auth/refresh/");
        assert_eq!(config.api.endpoints.login, "/auth/login/");
        assert!(matches!(config.store, StoreConfig::Memory));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn unknown_version_is_a_config_error() {
        let err = load_config_str("version: \"9.9.9\"\n").unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("jobdesk-missing-{}.yaml", uuid::Uuid::new_v4()));
        let config = load_config(&path).unwrap();
        assert_eq!(config.api.endpoints.profile, "/auth/profile/");
    }
}
