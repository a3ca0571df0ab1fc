use std::fmt;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SessionError};

/// Whether a request is on its first try or is the single replay that
/// follows a token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

/// Description of one outbound API call.
///
/// Requests are immutable values: replaying after a refresh produces a new
/// request tagged [`Attempt::Retry`] instead of mutating the original.
#[derive(Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<Value>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) with_credentials: bool,
    pub(crate) bearer: Option<String>,
    pub(crate) attempt: Attempt,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
            with_credentials: true,
            bearer: None,
            attempt: Attempt::First,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs;
        self
    }

    /// Sends the request without reading the stored access token.
    pub fn without_credentials(mut self) -> Self {
        self.with_credentials = false;
        self
    }

    /// Uses `token` instead of the stored access token.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// The replay of this request with a renewed access token.
    pub fn retried_with(&self, token: impl Into<String>) -> Self {
        ApiRequest {
            bearer: Some(token.into()),
            attempt: Attempt::Retry,
            ..self.clone()
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    pub fn is_retry(&self) -> bool {
        self.attempt == Attempt::Retry
    }
}

// Bearer tokens must not reach logs.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("with_credentials", &self.with_credentials)
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// A fully received HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub(crate) status: StatusCode,
    pub(crate) body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| SessionError::Decode(e.to_string()))
    }

    /// The error a non-success response turns into.
    pub(crate) fn into_error(self) -> SessionError {
        let body = self.text();
        if self.status == StatusCode::UNAUTHORIZED {
            SessionError::Unauthorized { body }
        } else {
            SessionError::Http {
                status: self.status,
                body,
            }
        }
    }
}
