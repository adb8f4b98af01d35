use async_trait::async_trait;

use crate::{domain::Post, Result};

/// Port to the remote feed-and-publishing service.
///
/// Every method fails with [`crate::Error::Remote`] on transport, auth or
/// rate-limit problems. Reply text is already within the platform limit when it
/// reaches [`FeedPort::publish_reply`].
#[async_trait]
pub trait FeedPort: Send + Sync {
    /// Newest post on the monitored feed.
    async fn fetch_most_recent_post(&self) -> Result<Post>;

    async fn publish_reply(&self, text: &str) -> Result<()>;

    /// Forward a failure message to the operator. Best-effort.
    async fn report_failure(&self, message: &str) -> Result<()>;
}
