use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, feed::throttled::DEFAULT_FETCH_MIN_INTERVAL, Result};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// OAuth 1.0a user-context credentials.
#[derive(Clone)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

/// Typed runtime configuration. The target account is not part of it; it comes
/// from the command line.
#[derive(Clone, Debug)]
pub struct Config {
    // Twitter
    pub credentials: TwitterCredentials,
    pub api_base: String,
    pub http_timeout: Duration,
    pub report_recipient: Option<String>,

    // Replies
    pub messages_file: PathBuf,

    // Loop pacing
    pub poll_interval: Duration,
    pub fetch_min_interval: Duration,

    // Console
    pub clear_screen: bool,
}

impl Config {
    /// Load from the process environment, after applying `./.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key).and_then(non_empty).ok_or_else(|| {
                Error::Config(format!("{key} environment variable is required"))
            })
        };

        let credentials = TwitterCredentials {
            consumer_key: required("TWITTER_CONSUMER_KEY")?,
            consumer_secret: required("TWITTER_CONSUMER_SECRET")?,
            access_token: required("TWITTER_ACCESS_TOKEN")?,
            access_token_secret: required("TWITTER_ACCESS_TOKEN_SECRET")?,
        };

        let api_base = lookup("TWITTER_API_BASE")
            .and_then(non_empty)
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let http_timeout = Duration::from_secs(parse_u64(&lookup, "HTTP_TIMEOUT_SECS")?.unwrap_or(10));
        let report_recipient = lookup("REPORT_RECIPIENT")
            .and_then(non_empty)
            .map(|s| s.trim().trim_start_matches('@').to_string());

        let messages_file = PathBuf::from(
            lookup("MESSAGES_FILE")
                .and_then(non_empty)
                .unwrap_or_else(|| "messages.txt".to_string()),
        );

        let poll_interval =
            Duration::from_secs(parse_u64(&lookup, "POLL_INTERVAL_SECS")?.unwrap_or(60));
        let fetch_min_interval = parse_u64(&lookup, "FETCH_MIN_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_MIN_INTERVAL);

        let clear_screen = lookup("CLEAR_SCREEN").map(|s| parse_bool(&s)).unwrap_or(true);

        Ok(Self {
            credentials,
            api_base,
            http_timeout,
            report_recipient,
            messages_file,
            poll_interval,
            fetch_min_interval,
            clear_screen,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = lookup(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
