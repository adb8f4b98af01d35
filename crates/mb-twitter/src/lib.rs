//! Twitter adapter (REST v1.1, OAuth 1.0a user context).
//!
//! This crate implements the `mb-core` FeedPort over the authenticating user's
//! home timeline.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::OnceCell;

pub mod model;
pub mod oauth;

use mb_core::{
    config::{Config, TwitterCredentials},
    domain::Post,
    errors::Error,
    feed::port::FeedPort,
    Result,
};

use crate::model::{RawStatus, RawUser};

const HOME_TIMELINE: &str = "/1.1/statuses/home_timeline.json";
const STATUS_UPDATE: &str = "/1.1/statuses/update.json";
const USERS_SHOW: &str = "/1.1/users/show.json";
const DIRECT_MESSAGE: &str = "/1.1/direct_messages/events/new.json";

/// Deleted or withheld statuses are filtered after `count` is applied, so ask
/// for a few to make an empty page unlikely.
const TIMELINE_PAGE: &str = "5";

pub struct TwitterClient {
    http: reqwest::Client,
    creds: TwitterCredentials,
    api_base: String,
    report_recipient: Option<String>,
    recipient_id: OnceCell<String>,
}

impl TwitterClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            creds: cfg.credentials.clone(),
            api_base: cfg.api_base.clone(),
            report_recipient: cfg.report_recipient.clone(),
            recipient_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        let auth = oauth::authorization_header(&self.creds, "GET", &url, query)?;
        let full = if query.is_empty() {
            url
        } else {
            format!("{url}?{}", oauth::encode_pairs(query))
        };

        let resp = self
            .http
            .get(full)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("twitter request error: {e}")))?;
        read_json(resp).await
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<serde_json::Value> {
        let url = self.url(path);
        let auth = oauth::authorization_header(&self.creds, "POST", &url, form)?;

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(oauth::encode_pairs(form))
            .send()
            .await
            .map_err(|e| Error::Remote(format!("twitter request error: {e}")))?;
        read_json(resp).await
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = self.url(path);
        // JSON bodies are not part of the OAuth signature.
        let auth = oauth::authorization_header(&self.creds, "POST", &url, &[])?;

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("twitter request error: {e}")))?;
        read_json(resp).await
    }

    /// Numeric id of the report recipient, looked up once.
    async fn recipient_id(&self, screen_name: &str) -> Result<&str> {
        let id = self
            .recipient_id
            .get_or_try_init(|| async {
                let user: RawUser = self.get(USERS_SHOW, &[("screen_name", screen_name)]).await?;
                user.id_str.ok_or_else(|| {
                    Error::Remote(format!("no id returned for report recipient @{screen_name}"))
                })
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl FeedPort for TwitterClient {
    async fn fetch_most_recent_post(&self) -> Result<Post> {
        let statuses: Vec<RawStatus> = self
            .get(
                HOME_TIMELINE,
                &[("count", TIMELINE_PAGE), ("tweet_mode", "extended")],
            )
            .await?;
        newest_post(statuses)
    }

    async fn publish_reply(&self, text: &str) -> Result<()> {
        self.post_form(STATUS_UPDATE, &[("status", text)]).await?;
        Ok(())
    }

    async fn report_failure(&self, message: &str) -> Result<()> {
        let Some(recipient) = self.report_recipient.as_deref() else {
            tracing::debug!("no report recipient configured; failure only logged");
            return Ok(());
        };

        let recipient_id = self.recipient_id(recipient).await?;
        let body = json!({
            "event": {
                "type": "message_create",
                "message_create": {
                    "target": { "recipient_id": recipient_id },
                    "message_data": { "text": message },
                },
            },
        });
        self.post_json(DIRECT_MESSAGE, &body).await?;
        Ok(())
    }
}

/// Timeline pages are newest first.
fn newest_post(statuses: Vec<RawStatus>) -> Result<Post> {
    statuses
        .into_iter()
        .next()
        .map(Post::from)
        .ok_or_else(|| Error::Remote("home timeline returned no posts".to_string()))
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Remote(format!("twitter response error: {e}")))?;

    if !status.is_success() {
        return Err(Error::Remote(describe_failure(status, &body)));
    }

    serde_json::from_str(&body)
        .map_err(|e| Error::Remote(format!("twitter returned malformed json: {e}")))
}

fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match model::error_message(body) {
        Some(msg) => format!("twitter error {}: {msg}", status.as_u16()),
        None => format!(
            "twitter request failed: {status} {}",
            body.chars().take(200).collect::<String>()
        ),
    }
}
