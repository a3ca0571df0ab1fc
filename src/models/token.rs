use serde::{Deserialize, Serialize};

/// Access and refresh tokens as issued by the login and registration endpoints.
/// Both values are opaque bearer strings.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        CredentialPair {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/login`.
#[derive(Serialize, Deserialize, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        LoginCredentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Body of `POST /auth/register`.
#[derive(Serialize, Deserialize, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Password confirmation, checked by the server.
    pub password2: String,
}

/// Body of `POST /auth/token/refresh`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Response of `POST /auth/token/refresh`. Servers that rotate refresh tokens
/// also send a new `refresh` value.
#[derive(Deserialize, Clone)]
pub struct RefreshGrant {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
