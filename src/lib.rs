//! Session-managing client for the job-board API.
//!
//! Tokens and the cached profile are persisted by the [`store`]; every call
//! goes through the [`client`] dispatcher, which renews an expired access
//! token once (shared by all concurrent failures) and replays the request.
//! The [`session`] module handles login, registration, logout and restoring
//! a persisted session at startup.

pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;

pub use client::{ApiClient, ApiRequest, ApiResponse};
pub use error::{Result, SessionError};
pub use session::{Session, SessionContext, SessionController, SessionState};
pub use state::AppState;
pub use store::TokenStore;
