use anyhow::{Context, Result};
use futures::future::BoxFuture;

use super::{Command, State};
use crate::feed::{Fetcher, DEFAULT_TIMEOUT};
use crate::ingest::Aggregator;
use crate::util::parse_interval;

/// `agg <interval>`: poll feeds until Ctrl-C.
pub(super) fn agg<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let raw = cmd.arg(0, "time_between_reqs")?;
        let interval =
            parse_interval(raw).with_context(|| format!("Invalid interval '{raw}'"))?;
        let fetcher = Fetcher::new(DEFAULT_TIMEOUT).context("Failed to build HTTP client")?;
        let aggregator = Aggregator::new(state.db.clone(), fetcher, interval);

        println!("Collecting feeds every {raw}");
        tracing::info!(interval = ?interval, "Starting aggregator");

        aggregator.run(shutdown_signal(), None).await;
        Ok(())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the loop runs until the process is killed
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl-C, shutting down");
}
