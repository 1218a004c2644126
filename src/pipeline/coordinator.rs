//! Pipeline coordinator
//!
//! Wires one run together: creates the shared rate gate, the outcome
//! channels and the cancellation context, starts the dispatcher in the
//! background, runs the aggregator in the foreground and reports the summary
//! once both are done.

use crate::config::{clamp_rate, BackoffConfig, Config, PipelineConfig};
use crate::output::{log_summary, RunSummary};
use crate::pipeline::aggregator::Aggregator;
use crate::pipeline::backoff::BackoffRetrier;
use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::fetcher::{SummaryFetcher, SummarySource};
use crate::pipeline::rate_gate::RateGate;
use crate::Result;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Outcomes are handed over one at a time; a busy aggregator holds attempts back
const OUTCOME_CHANNEL_CAPACITY: usize = 1;

/// Requests an early end of a run from outside the pipeline
///
/// Cloneable and usable from any task, e.g. a signal listener.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Asks the aggregator to finish; repeated calls are no-ops
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Runs the retrieval pipeline against a summary source
pub struct Coordinator<S: ?Sized> {
    pipeline: PipelineConfig,
    backoff: BackoffConfig,
    source: Arc<S>,
    stop: CancellationToken,
}

impl Coordinator<SummaryFetcher> {
    /// Creates a coordinator fetching from the configured Wikipedia endpoint
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(IpsumError)` - The endpoint or HTTP client could not be set up
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = SummaryFetcher::from_config(&config.api)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }
}

impl<S> Coordinator<S>
where
    S: SummarySource + ?Sized + 'static,
{
    pub fn new(config: &Config, source: Arc<S>) -> Self {
        Self {
            pipeline: config.pipeline.clone(),
            backoff: config.backoff.clone(),
            source,
            stop: CancellationToken::new(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.stop.clone(),
        }
    }

    /// Runs the pipeline until the target length is written or a stop is requested
    ///
    /// Snippets are written to `sink` in completion order. The dispatcher is
    /// joined before returning, so no new attempt starts afterwards; attempts
    /// still in flight observe the cancelled context and their outcomes are
    /// discarded.
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Statistics of the finished run
    /// * `Err(IpsumError)` - Writing to the sink failed or the dispatcher panicked
    pub async fn run<W>(self, sink: W) -> Result<RunSummary>
    where
        W: AsyncWrite + Unpin,
    {
        let rate = clamp_rate(self.pipeline.rate);
        tracing::info!(
            rate,
            target_length = self.pipeline.target_length,
            max_in_flight = self.pipeline.max_in_flight,
            "Starting run"
        );

        let cancel = CancellationToken::new();
        let (results_tx, results_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.source),
            Arc::new(RateGate::new(rate)),
            Arc::new(BackoffRetrier::new(self.backoff.clone())),
            results_tx,
            errors_tx,
            cancel.clone(),
        )
        .with_max_in_flight(self.pipeline.max_in_flight);
        let dispatch_handle = tokio::spawn(dispatcher.run());

        let aggregated = Aggregator::new(sink, self.pipeline.target_length, self.pipeline.verbose)
            .run(results_rx, errors_rx, self.stop.clone(), cancel.clone())
            .await;

        cancel.cancel();
        let dispatched = dispatch_handle.await?;

        let mut summary = aggregated?;
        summary.dispatched = dispatched;
        log_summary(&summary);

        Ok(summary)
    }
}
