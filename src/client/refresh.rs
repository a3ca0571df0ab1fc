//! Single-flight access-token renewal.
//!
//! When a dispatched request comes back 401, the coordinator renews the
//! access token with the stored refresh token and hands the dispatcher a
//! replay of the request carrying the new token. Concurrent failures share
//! one refresh call: the first one stores a [`Shared`] future under a mutex
//! and everyone else awaits a clone of it. The refresh future drops the
//! handle itself as it settles, so a 401 arriving afterwards starts a new
//! refresh instead of reusing a finished one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info, warn};

use super::request::ApiRequest;
use super::transport::HttpTransport;
use crate::error::{server_message_from_body, Result, SessionError};
use crate::models::{RefreshGrant, RefreshRequest};
use crate::session::SessionContext;
use crate::store::TokenStore;

type RefreshFuture = Shared<BoxFuture<'static, Result<String>>>;

struct PendingRefresh {
    id: u64,
    future: RefreshFuture,
}

pub struct RefreshCoordinator {
    transport: HttpTransport,
    store: TokenStore,
    session: SessionContext,
    refresh_path: String,
    pending: Arc<Mutex<Option<PendingRefresh>>>,
    /// Refresh calls issued so far; also the id of the latest one.
    issued: AtomicU64,
}

/// Paths are compared without trailing slashes, so `/auth/token/refresh`
/// and `/auth/token/refresh/` are the same endpoint.
fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

impl RefreshCoordinator {
    pub fn new(
        transport: HttpTransport,
        store: TokenStore,
        session: SessionContext,
        refresh_path: impl Into<String>,
    ) -> Self {
        RefreshCoordinator {
            transport,
            store,
            session,
            refresh_path: refresh_path.into(),
            pending: Arc::new(Mutex::new(None)),
            issued: AtomicU64::new(0),
        }
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    pub fn is_refresh_path(&self, path: &str) -> bool {
        normalize(path) == normalize(&self.refresh_path)
    }

    /// Number of refresh calls sent to the server since creation.
    pub fn refresh_count(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Whether a 401 on `request` may be recovered by a refresh: it must be a
    /// credentialed first attempt and must not target the refresh endpoint.
    pub fn should_attempt(&self, request: &ApiRequest) -> bool {
        request.with_credentials && !request.is_retry() && !self.is_refresh_path(&request.path)
    }

    /// Produces the single replay of `request` after a 401.
    ///
    /// `sent_with` is the bearer the failed attempt carried and `rejection` is
    /// the error returned when no refresh token is stored.
    pub async fn renew_for(
        &self,
        request: &ApiRequest,
        sent_with: Option<&str>,
        rejection: SessionError,
    ) -> Result<ApiRequest> {
        let Some(refresh_token) = self.store.refresh_token().await? else {
            debug!("No refresh token stored; surfacing the 401");
            return Err(rejection);
        };

        // Another request already renewed the token since this one was sent.
        if let Some(current) = self.store.access_token().await? {
            if sent_with != Some(current.as_str()) {
                debug!("Access token changed while the request was in flight; replaying");
                return Ok(request.retried_with(current));
            }
        }

        let access = self.refresh(refresh_token).await?;
        Ok(request.retried_with(access))
    }

    /// Joins the in-flight refresh, or starts one.
    pub async fn refresh(&self, refresh_token: String) -> Result<String> {
        let future = {
            let mut pending = lock_pending(&self.pending);
            match pending.as_ref() {
                Some(in_flight) => {
                    debug!(refresh_id = in_flight.id, "Joining in-flight token refresh");
                    in_flight.future.clone()
                }
                None => {
                    let id = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(refresh_id = id, "Starting token refresh");
                    let run = run_refresh(
                        self.transport.clone(),
                        self.store.clone(),
                        self.session.clone(),
                        self.refresh_path.clone(),
                        refresh_token,
                    );
                    let handle = self.pending.clone();
                    let future = async move {
                        let outcome = run.await;
                        let mut pending = lock_pending(&handle);
                        if pending.as_ref().map(|p| p.id) == Some(id) {
                            *pending = None;
                        }
                        outcome
                    }
                    .boxed()
                    .shared();
                    *pending = Some(PendingRefresh {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }
}

fn lock_pending(
    pending: &Mutex<Option<PendingRefresh>>,
) -> MutexGuard<'_, Option<PendingRefresh>> {
    // The guarded value is only ever replaced whole, so a poisoned lock
    // still holds a consistent handle.
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_refresh(
    transport: HttpTransport,
    store: TokenStore,
    session: SessionContext,
    refresh_path: String,
    refresh_token: String,
) -> Result<String> {
    match request_new_access(&transport, &refresh_path, &refresh_token).await {
        Ok(grant) => {
            let written = store
                .replace_access_token(&refresh_token, &grant.access, grant.refresh.as_deref())
                .await?;
            if !written {
                warn!("Session ended while the token refresh was in flight; discarding new token");
                return Err(SessionError::RefreshFailure(
                    "session ended during refresh".to_string(),
                ));
            }
            info!(rotated = grant.refresh.is_some(), "Access token refreshed");
            Ok(grant.access)
        }
        Err(failure) => {
            match store.clear_session_if(&refresh_token).await {
                Ok(true) => {
                    warn!(error = %failure, "Token refresh failed; session cleared");
                    session.sign_out();
                }
                Ok(false) => {
                    warn!(error = %failure, "Token refresh failed for a session that already ended");
                }
                Err(e) => {
                    error!(error = %e, "Failed to clear session after refresh failure");
                    session.sign_out();
                }
            }
            Err(failure)
        }
    }
}

async fn request_new_access(
    transport: &HttpTransport,
    refresh_path: &str,
    refresh_token: &str,
) -> Result<RefreshGrant> {
    let request = ApiRequest::post(refresh_path)
        .json(&RefreshRequest {
            refresh: refresh_token.to_string(),
        })?
        .without_credentials();

    let response = transport
        .send(&request, None)
        .await
        .map_err(|e| SessionError::RefreshFailure(e.to_string()))?;

    if !response.status().is_success() {
        let reason = server_message_from_body(&response.text())
            .unwrap_or_else(|| format!("refresh endpoint responded with {}", response.status()));
        return Err(SessionError::RefreshFailure(reason));
    }

    response
        .json::<RefreshGrant>()
        .map_err(|e| SessionError::RefreshFailure(format!("malformed refresh response: {}", e)))
}
