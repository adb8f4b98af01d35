use std::fmt;

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Feed post id (Twitter `id_str`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PostId(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A post fetched from the monitored feed. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    /// Author account name, without the leading `@`.
    pub author: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Two fetches of the same post compare equal by id even if other fields drift
    /// (edited counters, re-rendered text).
    pub fn is_same_post(&self, other: &Post) -> bool {
        self.id == other.id
    }
}

/// The single account the bot replies to. Set once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetAccount(String);

impl TargetAccount {
    /// Accepts `alice` or `@alice`; surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        let name = name.strip_prefix('@').unwrap_or(name).trim();
        if name.is_empty() {
            return Err(Error::Config("target account name is required".to_string()));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "target account name must not contain whitespace: {name:?}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `author` is this account.
    pub fn is_author_of(&self, post: &Post) -> bool {
        post.author == self.0
    }

    /// The `@name` mention prefix.
    pub fn mention(&self) -> String {
        format!("@{}", self.0)
    }
}

impl fmt::Display for TargetAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
