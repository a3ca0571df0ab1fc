use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use super::refresh::RefreshCoordinator;
use super::request::{ApiRequest, ApiResponse};
use super::transport::HttpTransport;
use crate::config::{ApiConfig, EndpointsConfig};
use crate::error::Result;
use crate::session::SessionContext;
use crate::store::TokenStore;
use crate::utils::log_throttle::LogThrottle;

const ANONYMOUS_LOG_WINDOW: Duration = Duration::from_secs(30);

/// The single outbound call path of the application.
///
/// Cloning is cheap and every clone shares the token store, the session and
/// the pending-refresh handle.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: HttpTransport,
    endpoints: EndpointsConfig,
    store: TokenStore,
    session: SessionContext,
    refresh: RefreshCoordinator,
    throttle: LogThrottle,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, store: TokenStore, session: SessionContext) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        let refresh = RefreshCoordinator::new(
            transport.clone(),
            store.clone(),
            session.clone(),
            config.endpoints.refresh.clone(),
        );

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                transport,
                endpoints: config.endpoints.clone(),
                store,
                session,
                refresh,
                throttle: LogThrottle::new(ANONYMOUS_LOG_WINDOW),
            }),
        })
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    pub fn endpoints(&self) -> &EndpointsConfig {
        &self.inner.endpoints
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Sends `request`, attaching the stored access token when credentials
    /// are requested. A 401 on a first attempt outside the refresh endpoint
    /// triggers one token refresh and exactly one replay.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
        let span = info_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        );
        self.dispatch_inner(request).instrument(span).await
    }

    async fn dispatch_inner(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        loop {
            let bearer = self.bearer_for(&request).await?;
            let response = self.inner.transport.send(&request, bearer.as_deref()).await?;
            let status = response.status();

            if status.is_success() {
                debug!(status = status.as_u16(), retry = request.is_retry(), "request succeeded");
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && self.inner.refresh.should_attempt(&request) {
                debug!("request rejected with 401; renewing access token");
                request = self
                    .inner
                    .refresh
                    .renew_for(&request, bearer.as_deref(), response.into_error())
                    .await?;
                continue;
            }

            debug!(status = status.as_u16(), retry = request.is_retry(), "request failed");
            return Err(response.into_error());
        }
    }

    async fn bearer_for(&self, request: &ApiRequest) -> Result<Option<String>> {
        if let Some(token) = &request.bearer {
            return Ok(Some(token.clone()));
        }
        if !request.with_credentials {
            return Ok(None);
        }
        let token = self.inner.store.access_token().await?;
        if token.is_none() {
            if let Some(suppressed) = self.inner.throttle.should_emit("dispatch.anonymous") {
                debug!(
                    suppressed,
                    "no access token stored; sending request unauthenticated"
                );
            }
        }
        Ok(token)
    }

    /// Dispatches and decodes a JSON response body.
    pub async fn dispatch_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.dispatch(request).await?.json()
    }
}
