//! Shared application state.
//!
//! Bundles the handles a front end needs: the session controller, the jobs
//! API and the observable session. Everything inside shares one token store
//! and one refresh coordinator.

use std::sync::Arc;

use crate::client::ApiClient;
use crate::config::ConfigV1;
use crate::jobs::JobsApi;
use crate::session::{SessionContext, SessionController};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Login, registration, logout and restoration.
    pub sessions: SessionController,
    /// Job postings.
    pub jobs: JobsApi,
}

impl AppState {
    pub fn client(&self) -> &ApiClient {
        self.sessions.client()
    }

    pub fn session(&self) -> &SessionContext {
        self.sessions.session()
    }
}
