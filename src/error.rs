//! Error taxonomy shared by the dispatcher, the refresh coordinator and the
//! session controller.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Every failure surfaced by this crate.
///
/// The type is `Clone` because a single refresh failure is handed to every
/// request that joined the pending refresh.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The server rejected the login call.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The server rejected a registration with field-level errors.
    #[error("registration rejected: {}", format_fields(.fields))]
    Validation { fields: BTreeMap<String, Vec<String>> },

    /// The refresh token was missing, invalid or expired. Terminal for the session.
    #[error("token refresh failed: {0}")]
    RefreshFailure(String),

    /// A 401 that could not be recovered (no refresh token, or already retried).
    #[error("request was not authorized")]
    Unauthorized { body: String },

    /// Any other non-success HTTP status.
    #[error("server responded with {status}")]
    Http { status: StatusCode, body: String },

    /// Transport-level failure (connection refused, timeout, TLS ...).
    #[error("network error: {0}")]
    Network(String),

    #[error("token storage error: {0}")]
    Storage(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// HTTP status carried by the error, if the server produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SessionError::Http { status, .. } => Some(*status),
            SessionError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// Human-readable message the server attached to a failed call.
    ///
    /// Looks at the `error`, then `detail` keys of a JSON body, falling back
    /// to the first entry of `non_field_errors`.
    pub fn server_message(&self) -> Option<String> {
        let body = match self {
            SessionError::Http { body, .. } | SessionError::Unauthorized { body } => body,
            SessionError::InvalidCredentials(msg) | SessionError::RefreshFailure(msg) => {
                return Some(msg.clone())
            }
            _ => return None,
        };
        server_message_from_body(body)
    }
}

pub(crate) fn server_message_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for key in ["error", "detail"] {
        if let Some(msg) = value.get(key).and_then(Value::as_str) {
            return Some(msg.to_string());
        }
    }
    value
        .get("non_field_errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Parses a `{"field": ["msg", ...]}` body into field errors. Scalar values are
/// treated as a single message.
pub(crate) fn field_errors_from_body(body: &str) -> BTreeMap<String, Vec<String>> {
    let mut fields = BTreeMap::new();
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return fields;
    };
    for (field, value) in map {
        let messages = match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Value::String(s) => vec![s],
            other => vec![other.to_string()],
        };
        fields.insert(field, messages);
    }
    fields
}

fn format_fields(fields: &BTreeMap<String, Vec<String>>) -> String {
    if fields.is_empty() {
        return "no details provided".to_string();
    }
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SessionError::Decode(e.to_string())
        } else {
            SessionError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Decode(e.to_string())
    }
}
