//! Wire shapes for the v1.1 REST endpoints we touch.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use mb_core::domain::{Post, PostId};

/// `created_at` format used by v1.1, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Deserialize)]
pub(crate) struct RawStatus {
    pub id_str: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub user: RawUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    #[serde(default)]
    pub id_str: Option<String>,
    pub screen_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawErrors {
    #[serde(default)]
    pub errors: Vec<RawError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawError {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

impl From<RawStatus> for Post {
    fn from(raw: RawStatus) -> Self {
        Post {
            id: PostId(raw.id_str),
            author: raw.user.screen_name,
            text: raw.full_text.or(raw.text).unwrap_or_default(),
            created_at: raw.created_at.as_deref().and_then(parse_created_at),
        }
    }
}

pub(crate) fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, CREATED_AT_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Human-readable message from an error response body, if it has the usual
/// `{"errors":[{"code":..,"message":..}]}` shape.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let parsed: RawErrors = serde_json::from_str(body).ok()?;
    let msgs = parsed
        .errors
        .into_iter()
        .map(|e| match e.code {
            Some(code) => format!("{} (code {code})", e.message),
            None => e.message,
        })
        .collect::<Vec<_>>();
    if msgs.is_empty() {
        None
    } else {
        Some(msgs.join("; "))
    }
}
