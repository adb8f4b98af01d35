use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{domain::Post, feed::port::FeedPort, Result};

/// Fetch spacing for the home timeline: 15 requests per 15 minutes.
pub const DEFAULT_FETCH_MIN_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// FeedPort decorator that spaces out timeline fetches.
///
/// Publishing and failure reports pass straight through; only
/// `fetch_most_recent_post` is rate limited.
pub struct ThrottledFeed {
    inner: Arc<dyn FeedPort>,
    fetch: Mutex<IntervalLimiter>,
}

impl ThrottledFeed {
    pub fn new(inner: Arc<dyn FeedPort>, fetch_min_interval: Duration) -> Self {
        Self {
            inner,
            fetch: Mutex::new(IntervalLimiter::new(fetch_min_interval)),
        }
    }

    async fn throttle_fetch(&self) {
        let wait = { self.fetch.lock().await.reserve() };
        if wait > Duration::ZERO {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "throttling timeline fetch");
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl FeedPort for ThrottledFeed {
    async fn fetch_most_recent_post(&self) -> Result<Post> {
        self.throttle_fetch().await;
        self.inner.fetch_most_recent_post().await
    }

    async fn publish_reply(&self, text: &str) -> Result<()> {
        self.inner.publish_reply(text).await
    }

    async fn report_failure(&self, message: &str) -> Result<()> {
        self.inner.report_failure(message).await
    }
}
