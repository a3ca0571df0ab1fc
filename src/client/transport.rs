use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::request::{ApiRequest, ApiResponse};
use crate::config::ApiConfig;
use crate::error::{Result, SessionError};

/// Sends one request over HTTP. No retries and no token handling happen here.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout_ms) = config.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let http = builder
            .build()
            .map_err(|e| SessionError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);
        let mut builder = self.http.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        Ok(ApiResponse { status, body })
    }
}
