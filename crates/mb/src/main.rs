use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use mb_core::{
    catalog::MessageCatalog,
    config::Config,
    control::{ControlLoop, LoopExit, LoopState},
    domain::TargetAccount,
    failure::FAILURE_BUDGET,
    feed::{port::FeedPort, throttled::ThrottledFeed},
    report::ConsoleStatus,
};
use mb_twitter::TwitterClient;

#[derive(Parser)]
#[command(name = "mb")]
#[command(version, about = "Replies to a Twitter account whenever it tops your home timeline")]
struct Cli {
    /// Screen name to reply to (prompted for when omitted)
    target: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mb_core::logging::init("mb")?;
    let cli = Cli::parse();

    let raw_target = match cli.target {
        Some(t) => t,
        None => prompt_target().await.context("failed to read target account")?,
    };
    let target = TargetAccount::parse(&raw_target)?;

    let cfg = Config::load()?;
    let catalog = MessageCatalog::load(target.clone(), &cfg.messages_file)?;
    for rejected in catalog.rejected() {
        tracing::warn!(
            reply = %rejected,
            "dropping reply that would exceed {} characters for {target}",
            mb_core::catalog::MAX_REPLY_LEN
        );
    }
    tracing::info!(
        accepted = catalog.len(),
        rejected = catalog.rejected().len(),
        file = %cfg.messages_file.display(),
        "loaded reply messages"
    );

    let client: Arc<dyn FeedPort> = Arc::new(TwitterClient::new(&cfg)?);
    let feed: Arc<dyn FeedPort> = Arc::new(ThrottledFeed::new(client, cfg.fetch_min_interval));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received");
                shutdown.cancel();
            }
        });
    }

    let mut control = ControlLoop::new(feed, catalog, Arc::new(ConsoleStatus::new(cfg.clear_screen)))?
        .with_poll_interval(cfg.poll_interval)
        .with_shutdown(shutdown);
    let mut state = LoopState::new(FAILURE_BUDGET);

    match control.run(&mut state).await {
        LoopExit::BudgetExhausted => tracing::info!(
            cycles = state.cycles,
            replies = state.replies,
            failures = state.failures.count(),
            "giving up after repeated failures"
        ),
        LoopExit::Shutdown => tracing::info!(
            cycles = state.cycles,
            replies = state.replies,
            "stopped"
        ),
    }

    Ok(())
}

async fn prompt_target() -> std::io::Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Please enter the screen name of a user you would like\nthe bot to reply to.\n>> @")
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line)
}
