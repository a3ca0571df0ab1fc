#![allow(dead_code)]

use std::sync::Arc;

use jobdesk::config::{ApiConfig, ConfigV1, StoreConfig};
use jobdesk::models::{CredentialPair, UserProfile};
use jobdesk::startup;
use jobdesk::state::AppState;
use jobdesk::{ApiClient, SessionContext, SessionController, TokenStore};

pub const REFRESH_PATH: &str = "/auth/token/refresh/";

/// An in-memory application pointed at `base_url`.
pub async fn build_app(base_url: String) -> AppState {
    let config = ConfigV1 {
        api: ApiConfig::with_base_url(base_url),
        store: StoreConfig::Memory,
        ..Default::default()
    };
    startup::build(Arc::new(config))
        .await
        .expect("app should build")
}

/// A controller over a caller-provided store, for tests that inspect it.
pub fn controller_with_store(base_url: String, store: TokenStore) -> SessionController {
    let client = ApiClient::new(
        &ApiConfig::with_base_url(base_url),
        store,
        SessionContext::new(),
    )
    .expect("client should build");
    SessionController::new(client)
}

/// Puts the store in the state a previous login would have left.
pub async fn seed_session(store: &TokenStore, access: &str, refresh: &str, username: &str) {
    store
        .save_session(
            &CredentialPair::new(access, refresh),
            &UserProfile::new(1, username),
        )
        .await
        .expect("seeding the store should succeed");
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
