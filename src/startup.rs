//! Application startup.
//!
//! Creates the token store backend, the session context and the API client
//! from configuration, then restores any persisted session.

use std::sync::Arc;

use tracing::info;

use crate::client::ApiClient;
use crate::config::ConfigV1;
use crate::error::Result;
use crate::jobs::JobsApi;
use crate::session::{SessionContext, SessionController};
use crate::state::AppState;
use crate::store::{create_backend, TokenStore};

/// Wires the application together without touching the network.
///
/// The returned session is still `Restoring`; call [`start`] or
/// `SessionController::restore` to finish startup.
pub async fn build(config: Arc<ConfigV1>) -> Result<AppState> {
    let backend = create_backend(&config.store).await?;
    let store = TokenStore::new(backend);
    let session = SessionContext::new();
    let client = ApiClient::new(&config.api, store, session)?;

    info!("API client targeting {}", config.api.base_url);

    Ok(AppState {
        config,
        sessions: SessionController::new(client.clone()),
        jobs: JobsApi::new(client),
    })
}

/// Builds the application and restores the persisted session.
pub async fn start(config: Arc<ConfigV1>) -> Result<AppState> {
    let state = build(config).await?;
    state.sessions.restore().await;
    Ok(state)
}
