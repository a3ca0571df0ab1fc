use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The account record returned by `GET /auth/profile` and by registration.
///
/// This is a display cache: it is persisted next to the tokens so a restarted
/// client can show who is signed in without a network round trip. Fields the
/// client does not know about are kept in `extra` and written back unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl UserProfile {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        UserProfile {
            id,
            username: username.into(),
            email: None,
            created_at: None,
            last_login: None,
            extra: BTreeMap::new(),
        }
    }

    /// Account creation time, when the server sent an RFC 3339 timestamp.
    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created_at.as_deref())
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.last_login.as_deref())
    }
}

pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
