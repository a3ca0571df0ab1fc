use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::context::{Session, SessionContext};
use crate::client::{ApiClient, ApiRequest};
use crate::error::{field_errors_from_body, server_message_from_body, Result, SessionError};
use crate::models::{CredentialPair, LoginCredentials, Registration, UserProfile};

/// Values the browser-era client wrote for "no profile".
const ABSENT_PROFILE_SENTINELS: [&str; 3] = ["", "undefined", "null"];

/// Registration answers with tokens and the new profile in one body.
#[derive(Deserialize)]
struct RegistrationGrant {
    access: String,
    refresh: String,
    user: UserProfile,
}

/// Establishes and ends sessions: startup restoration, login, registration
/// and logout. All network traffic goes through the [`ApiClient`].
#[derive(Clone)]
pub struct SessionController {
    client: ApiClient,
}

impl SessionController {
    pub fn new(client: ApiClient) -> Self {
        SessionController { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &SessionContext {
        self.client.session()
    }

    /// Loads the cached profile, without any network call. Always leaves the
    /// session with `loading == false`.
    pub async fn restore(&self) -> Session {
        let user = match self.client.store().cached_profile_raw().await {
            Ok(Some(raw)) => parse_cached_profile(&raw),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Could not read cached profile; starting anonymous");
                None
            }
        };

        match &user {
            Some(profile) => info!("Restored session for '{}'", profile.username),
            None => info!("No cached session; starting anonymous"),
        }
        self.session().finish_restore(user);
        self.session().current()
    }

    /// Logs in, stores the issued tokens, then fetches and caches the profile.
    ///
    /// A rejected login leaves the token store untouched. If the profile
    /// cannot be fetched afterwards, the freshly stored tokens are removed
    /// again and the session is signed out before the error is returned.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserProfile> {
        let endpoints = self.client.endpoints();
        let request = ApiRequest::post(&endpoints.login)
            .json(credentials)?
            .without_credentials();

        let tokens: CredentialPair = self
            .client
            .dispatch(request)
            .await
            .map_err(login_error)?
            .json()?;
        self.client.store().save_credentials(&tokens).await?;

        let profile_request = ApiRequest::get(&endpoints.profile).bearer(&tokens.access);
        let profile = match self.client.dispatch_json::<UserProfile>(profile_request).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Profile fetch after login failed; discarding tokens");
                if let Err(clear_err) = self.client.store().clear_session().await {
                    error!(error = %clear_err, "Failed to discard tokens");
                }
                // Any earlier session was replaced by the discarded tokens.
                self.session().sign_out();
                return Err(e);
            }
        };

        self.client.store().save_profile(&profile).await?;
        self.session().sign_in(profile.clone());
        Ok(profile)
    }

    /// Creates an account. The server returns tokens and profile together,
    /// so no separate profile fetch is made.
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile> {
        let request = ApiRequest::post(&self.client.endpoints().register)
            .json(registration)?
            .without_credentials();

        let grant: RegistrationGrant = self
            .client
            .dispatch(request)
            .await
            .map_err(registration_error)?
            .json()?;

        let tokens = CredentialPair::new(grant.access, grant.refresh);
        self.client.store().save_session(&tokens, &grant.user).await?;
        self.session().sign_in(grant.user.clone());
        Ok(grant.user)
    }

    /// Forgets tokens and profile. Never fails and makes no network call; a
    /// storage error is logged and the in-memory session is cleared anyway.
    pub async fn logout(&self) {
        if let Err(e) = self.client.store().clear_session().await {
            error!(error = %e, "Failed to clear stored session during logout");
        }
        self.session().sign_out();
        info!("Logged out");
    }

    /// Re-reads the account details from the server and refreshes the cache.
    pub async fn fetch_profile(&self) -> Result<UserProfile> {
        let request = ApiRequest::get(&self.client.endpoints().profile);
        let profile: UserProfile = self.client.dispatch_json(request).await?;
        self.client.store().save_profile(&profile).await?;
        self.session().sign_in(profile.clone());
        Ok(profile)
    }
}

fn parse_cached_profile(raw: &str) -> Option<UserProfile> {
    if ABSENT_PROFILE_SENTINELS.contains(&raw.trim()) {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed cached profile");
            None
        }
    }
}

fn is_rejection(status: Option<StatusCode>) -> bool {
    matches!(
        status,
        Some(StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    )
}

fn login_error(e: SessionError) -> SessionError {
    if !is_rejection(e.status()) {
        return e;
    }
    let body = match &e {
        SessionError::Http { body, .. } | SessionError::Unauthorized { body } => body.as_str(),
        _ => "",
    };
    SessionError::InvalidCredentials(
        server_message_from_body(body).unwrap_or_else(|| "Invalid credentials".to_string()),
    )
}

fn registration_error(e: SessionError) -> SessionError {
    match e {
        SessionError::Http { status, ref body } if status == StatusCode::BAD_REQUEST => {
            SessionError::Validation {
                fields: field_errors_from_body(body),
            }
        }
        other => other,
    }
}
