//! The polling loop: fetch → evaluate → (select + publish) → report → wait.
//!
//! Every remote failure is reported and counted against a fixed budget, and the
//! loop goes straight back to polling. Once the budget is spent it stops for good.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    catalog::MessageCatalog,
    domain::{Post, PostId},
    failure::{FailureTracker, FAILURE_BUDGET},
    feed::port::FeedPort,
    report::{CycleReport, StatusSink},
    selector::{ReplySelector, SelectionState},
    Error, Result,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Mutable loop counters, passed explicitly into every cycle.
#[derive(Clone, Debug)]
pub struct LoopState {
    pub cycles: u64,
    pub replies: u64,
    pub failures: FailureTracker,
    pub last_replied: Option<Post>,
    pub selection: SelectionState,
}

impl LoopState {
    pub fn new(failure_budget: u32) -> Self {
        Self {
            cycles: 0,
            replies: 0,
            failures: FailureTracker::new(failure_budget),
            last_replied: None,
            selection: SelectionState::default(),
        }
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new(FAILURE_BUDGET)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Same post we already replied to.
    AlreadyHandled,
    /// Newest post is by someone else.
    OtherAuthor,
}

/// What a single cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Replied { post: PostId, message_index: usize },
    Ignored(IgnoreReason),
    Failed { budget_exhausted: bool },
}

/// Why [`ControlLoop::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    BudgetExhausted,
    Shutdown,
}

pub struct ControlLoop {
    feed: Arc<dyn FeedPort>,
    catalog: MessageCatalog,
    selector: ReplySelector,
    status: Arc<dyn StatusSink>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl ControlLoop {
    /// Refuses an empty catalog: nothing could ever be published.
    pub fn new(
        feed: Arc<dyn FeedPort>,
        catalog: MessageCatalog,
        status: Arc<dyn StatusSink>,
    ) -> Result<Self> {
        catalog.ensure_usable()?;
        Ok(Self {
            feed,
            catalog,
            selector: ReplySelector::new(),
            status,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_selector(mut self, selector: ReplySelector) -> Self {
        self.selector = selector;
        self
    }

    /// Token that stops the loop before its next poll; cancelling it also cuts
    /// the current wait short.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Run cycles until the failure budget is exhausted or shutdown is requested.
    pub async fn run(&mut self, state: &mut LoopState) -> LoopExit {
        tracing::info!(
            target_account = %self.catalog.target(),
            messages = self.catalog.len(),
            interval_secs = self.poll_interval.as_secs(),
            "mention loop started"
        );

        loop {
            if state.failures.budget_exhausted() {
                tracing::warn!(
                    failures = state.failures.count(),
                    "failure budget exhausted, stopping"
                );
                return LoopExit::BudgetExhausted;
            }
            if self.shutdown.is_cancelled() {
                tracing::info!("shutdown requested, stopping");
                return LoopExit::Shutdown;
            }

            let outcome = self.run_cycle(state).await;
            tracing::debug!(?outcome, cycles = state.cycles, "cycle finished");

            // Failed cycles re-poll immediately; fetch spacing is the feed's job.
            if matches!(outcome, CycleOutcome::Failed { .. }) {
                continue;
            }
            self.wait().await;
        }
    }

    /// One pass through Polling → Evaluating → (Replying) → Reporting. Does not wait.
    pub async fn run_cycle(&mut self, state: &mut LoopState) -> CycleOutcome {
        let post = match self.feed.fetch_most_recent_post().await {
            Ok(post) => post,
            Err(e) => return self.handle_failure(state, e).await,
        };

        let outcome = match self.evaluate(state, &post) {
            Some(reason) => CycleOutcome::Ignored(reason),
            None => match self.reply(state, post).await {
                Ok(outcome) => outcome,
                Err(e) => return self.handle_failure(state, e).await,
            },
        };

        state.cycles += 1;
        self.status.cycle_completed(&CycleReport {
            cycles: state.cycles,
            replies: state.replies,
            target: self.catalog.target().clone(),
        });

        outcome
    }

    /// `None` if the post qualifies for a reply.
    fn evaluate(&self, state: &LoopState, post: &Post) -> Option<IgnoreReason> {
        if state
            .last_replied
            .as_ref()
            .is_some_and(|last| last.is_same_post(post))
        {
            return Some(IgnoreReason::AlreadyHandled);
        }
        if !self.catalog.target().is_author_of(post) {
            return Some(IgnoreReason::OtherAuthor);
        }
        None
    }

    async fn reply(&mut self, state: &mut LoopState, post: Post) -> Result<CycleOutcome> {
        let index = self
            .selector
            .next(&self.catalog, state.selection.last())
            .ok_or_else(|| Error::Config("message catalog is empty".to_string()))?;
        let text = self
            .catalog
            .compose(index)
            .ok_or_else(|| Error::Config(format!("message index {index} out of range")))?;

        self.feed.publish_reply(&text).await?;

        tracing::info!(post = %post.id, message_index = index, "replied to {}", self.catalog.target());
        state.replies += 1;
        state.selection.commit(index);
        let id = post.id.clone();
        state.last_replied = Some(post);

        Ok(CycleOutcome::Replied {
            post: id,
            message_index: index,
        })
    }

    /// Report, count, and decide whether the loop may go on.
    async fn handle_failure(&self, state: &mut LoopState, err: Error) -> CycleOutcome {
        let message = err.report_message();
        tracing::warn!(error = %err, "cycle failed");
        self.status.failure(&message);
        state.failures.record_failure();

        // A failing report channel costs another unit of budget.
        if let Err(report_err) = self.feed.report_failure(&message).await {
            tracing::warn!(error = %report_err, "failure report could not be delivered");
            self.status.failure(&report_err.report_message());
            state.failures.record_failure();
        }

        let budget_exhausted = state.failures.budget_exhausted();
        tracing::info!(
            failures = state.failures.count(),
            remaining = state.failures.remaining(),
            "failure recorded"
        );
        CycleOutcome::Failed { budget_exhausted }
    }

    async fn wait(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = sleep(self.poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::MAX_REPLY_LEN, domain::TargetAccount};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn post(id: &str, author: &str) -> Post {
        Post {
            id: PostId(id.to_string()),
            author: author.to_string(),
            text: format!("post {id}"),
            created_at: None,
        }
    }

    /// Scripted feed: each fetch pops the next result; once the script runs out
    /// the last post is repeated.
    #[derive(Default)]
    struct FakeFeed {
        script: Mutex<VecDeque<Result<Post>>>,
        last: Mutex<Option<Post>>,
        fail_publish: Mutex<bool>,
        fail_reports: Mutex<bool>,
        published: Mutex<Vec<String>>,
        reports: Mutex<Vec<String>>,
    }

    impl FakeFeed {
        fn with_script(script: Vec<Result<Post>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        fn published(&self) -> Vec<String> {
            self.published.lock().unwrap().clone()
        }

        fn reports(&self) -> Vec<String> {
            self.reports.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedPort for FakeFeed {
        async fn fetch_most_recent_post(&self) -> Result<Post> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(p)) => {
                    *self.last.lock().unwrap() = Some(p.clone());
                    Ok(p)
                }
                Some(Err(e)) => Err(e),
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or_else(|| Error::Remote("timeline is empty".to_string())),
            }
        }

        async fn publish_reply(&self, text: &str) -> Result<()> {
            if *self.fail_publish.lock().unwrap() {
                return Err(Error::Remote("Status is a duplicate.".to_string()));
            }
            self.published.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn report_failure(&self, message: &str) -> Result<()> {
            self.reports.lock().unwrap().push(message.to_string());
            if *self.fail_reports.lock().unwrap() {
                return Err(Error::Remote("direct message rejected".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingStatus {
        reports: Mutex<Vec<CycleReport>>,
        failures: Mutex<Vec<String>>,
    }

    impl StatusSink for RecordingStatus {
        fn cycle_completed(&self, report: &CycleReport) {
            self.reports.lock().unwrap().push(report.clone());
        }

        fn failure(&self, message: &str) {
            self.failures.lock().unwrap().push(message.to_string());
        }
    }

    fn catalog(messages: &[&str]) -> MessageCatalog {
        let mut c = MessageCatalog::new(TargetAccount::parse("alice").unwrap());
        for m in messages {
            c.add(*m);
        }
        c
    }

    fn control(feed: Arc<FakeFeed>, status: Arc<RecordingStatus>) -> ControlLoop {
        ControlLoop::new(feed, catalog(&["hello", "hi there"]), status)
            .unwrap()
            .with_selector(ReplySelector::seeded(11))
            .with_poll_interval(Duration::ZERO)
    }

    fn remote(msg: &str) -> Result<Post> {
        Err(Error::Remote(msg.to_string()))
    }

    #[test]
    fn empty_catalog_is_refused_before_the_loop() {
        let feed = Arc::new(FakeFeed::default());
        let status = Arc::new(RecordingStatus::default());
        let res = ControlLoop::new(feed, catalog(&[]), status);
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn replies_once_to_a_new_target_post() {
        let feed = Arc::new(FakeFeed::with_script(vec![Ok(post("1", "alice"))]));
        let status = Arc::new(RecordingStatus::default());
        let mut ctl = control(feed.clone(), status.clone());
        let mut state = LoopState::default();

        let first = ctl.run_cycle(&mut state).await;
        assert!(matches!(first, CycleOutcome::Replied { ref post, .. } if post.0 == "1"));

        let published = feed.published();
        assert_eq!(published.len(), 1);
        assert!(published[0].starts_with("@alice"));
        assert!(published[0].chars().count() <= MAX_REPLY_LEN);
        assert_eq!(state.last_replied.as_ref().map(|p| p.id.0.as_str()), Some("1"));
        assert_eq!(state.replies, 1);

        // The feed returns the same post again: already handled.
        let second = ctl.run_cycle(&mut state).await;
        assert_eq!(second, CycleOutcome::Ignored(IgnoreReason::AlreadyHandled));
        assert_eq!(feed.published().len(), 1);
        assert_eq!(state.cycles, 2);

        let reports = status.reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].replies, 1);
        assert_eq!(reports[1].cycles, 2);
    }

    #[tokio::test]
    async fn ignores_posts_by_other_authors() {
        let feed = Arc::new(FakeFeed::with_script(vec![
            Ok(post("1", "bob")),
            Ok(post("2", "Alice")),
        ]));
        let status = Arc::new(RecordingStatus::default());
        let mut ctl = control(feed.clone(), status.clone());
        let mut state = LoopState::default();

        for _ in 0..2 {
            assert_eq!(
                ctl.run_cycle(&mut state).await,
                CycleOutcome::Ignored(IgnoreReason::OtherAuthor)
            );
        }
        assert!(feed.published().is_empty());
        assert!(state.last_replied.is_none());
        assert_eq!(state.cycles, 2);
        assert_eq!(status.reports.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn consecutive_replies_use_different_messages() {
        let feed = Arc::new(FakeFeed::with_script(
            (1..=20).map(|i| Ok(post(&i.to_string(), "alice"))).collect(),
        ));
        let status = Arc::new(RecordingStatus::default());
        let mut ctl = control(feed.clone(), status);
        let mut state = LoopState::default();

        for _ in 0..20 {
            ctl.run_cycle(&mut state).await;
        }
        let published = feed.published();
        assert_eq!(published.len(), 20);
        for pair in published.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn publish_failure_leaves_selection_and_dedup_untouched() {
        let feed = Arc::new(FakeFeed::with_script(vec![Ok(post("1", "alice"))]));
        *feed.fail_publish.lock().unwrap() = true;
        let status = Arc::new(RecordingStatus::default());
        let mut ctl = control(feed.clone(), status.clone());
        let mut state = LoopState::default();

        let outcome = ctl.run_cycle(&mut state).await;
        assert_eq!(outcome, CycleOutcome::Failed { budget_exhausted: false });
        assert!(state.last_replied.is_none());
        assert_eq!(state.selection.last(), None);
        assert_eq!(state.replies, 0);
        assert_eq!(state.failures.count(), 1);
        assert_eq!(feed.reports(), vec!["Status is a duplicate.".to_string()]);
        assert!(status.reports.lock().unwrap().is_empty());

        // Next cycle retries the same post.
        *feed.fail_publish.lock().unwrap() = false;
        assert!(matches!(
            ctl.run_cycle(&mut state).await,
            CycleOutcome::Replied { .. }
        ));
    }

    #[tokio::test]
    async fn halts_after_five_fetch_failures() {
        let feed = Arc::new(FakeFeed::with_script(
            (0..10).map(|i| remote(&format!("boom {i}"))).collect(),
        ));
        let status = Arc::new(RecordingStatus::default());
        let mut ctl = control(feed.clone(), status.clone());
        let mut state = LoopState::default();

        let exit = ctl.run(&mut state).await;
        assert_eq!(exit, LoopExit::BudgetExhausted);
        assert_eq!(state.failures.count(), FAILURE_BUDGET);
        assert_eq!(feed.reports().len(), 5);
        assert_eq!(feed.reports()[4], "boom 4");
        assert!(feed.published().is_empty());
        assert_eq!(state.cycles, 0);
        assert_eq!(status.failures.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn failed_reports_count_against_the_budget() {
        let feed = Arc::new(FakeFeed::with_script(
            (0..10).map(|_| remote("rate limited")).collect(),
        ));
        *feed.fail_reports.lock().unwrap() = true;
        let status = Arc::new(RecordingStatus::default());
        let mut ctl = control(feed.clone(), status);
        let mut state = LoopState::default();

        let exit = ctl.run(&mut state).await;
        assert_eq!(exit, LoopExit::BudgetExhausted);
        // Each failed cycle costs two: 2, 4, 6.
        assert_eq!(feed.reports().len(), 3);
        assert_eq!(state.failures.count(), 6);
    }

    #[tokio::test]
    async fn failures_are_not_reset_by_successes() {
        let mut script = vec![remote("a"), remote("b")];
        script.push(Ok(post("1", "alice")));
        script.extend((0..3).map(|_| remote("c")));
        let feed = Arc::new(FakeFeed::with_script(script));
        let status = Arc::new(RecordingStatus::default());
        let mut ctl = control(feed.clone(), status);
        let mut state = LoopState::default();

        assert_eq!(ctl.run(&mut state).await, LoopExit::BudgetExhausted);
        assert_eq!(state.replies, 1);
        assert_eq!(state.failures.count(), 5);
        assert_eq!(feed.reports().len(), 5);
    }

    #[tokio::test]
    async fn failure_returns_to_polling_without_waiting() {
        let feed = Arc::new(FakeFeed::with_script(vec![
            remote("blip"),
            Ok(post("1", "alice")),
        ]));
        let status = Arc::new(RecordingStatus::default());
        let shutdown = CancellationToken::new();
        let mut ctl = control(feed.clone(), status)
            .with_poll_interval(Duration::from_secs(3600))
            .with_shutdown(shutdown.clone());
        let mut state = LoopState::default();

        let canceller = tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            shutdown.cancel();
        });

        let exit = ctl.run(&mut state).await;
        canceller.await.unwrap();
        assert_eq!(exit, LoopExit::Shutdown);
        assert_eq!(state.failures.count(), 1);
        assert_eq!(feed.reports(), vec!["blip".to_string()]);
        assert_eq!(feed.published().len(), 1);
        assert_eq!(state.cycles, 1);
    }

    #[tokio::test]
    async fn shutdown_stops_before_next_poll() {
        let feed = Arc::new(FakeFeed::with_script(vec![Ok(post("1", "bob"))]));
        let status = Arc::new(RecordingStatus::default());
        let shutdown = CancellationToken::new();
        let mut ctl = control(feed.clone(), status)
            .with_poll_interval(Duration::from_secs(3600))
            .with_shutdown(shutdown.clone());
        let mut state = LoopState::default();

        let canceller = tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            shutdown.cancel();
        });

        let exit = ctl.run(&mut state).await;
        canceller.await.unwrap();
        assert_eq!(exit, LoopExit::Shutdown);
        assert_eq!(state.cycles, 1);
        assert_eq!(state.failures.count(), 0);
    }

    #[tokio::test]
    async fn exhausted_state_runs_no_cycle() {
        let feed = Arc::new(FakeFeed::with_script(vec![Ok(post("1", "alice"))]));
        let status = Arc::new(RecordingStatus::default());
        let mut ctl = control(feed.clone(), status);
        let mut state = LoopState::new(0);

        assert_eq!(ctl.run(&mut state).await, LoopExit::BudgetExhausted);
        assert_eq!(state.cycles, 0);
        assert!(feed.published().is_empty());
    }
}
