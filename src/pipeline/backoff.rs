//! Retry logic with exponential backoff
//!
//! Throttling (HTTP 429) is the only condition worth retrying: every other
//! outcome is terminal for the attempt. Delays grow geometrically, are
//! randomized to avoid synchronized retries across attempts, and are reported
//! to the dispatcher as pacing hints so the whole pipeline slows down.

use crate::config::BackoffConfig;
use crate::pipeline::fetcher::{FetchError, FetchOutcome, SummarySource};
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Sending half of the pacing-hint channel, one per pipeline
pub type PacingSender = mpsc::UnboundedSender<Duration>;

/// Receiving half of the pacing-hint channel, owned by the dispatcher
pub type PacingReceiver = mpsc::UnboundedReceiver<Duration>;

/// Backoff state for a single attempt
///
/// Created fresh for every attempt and dropped with it.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current_interval: Duration,
    multiplier: f64,
    randomization_factor: f64,
    max_interval: Duration,
    max_elapsed_time: Duration,
    started_at: Instant,
    retries: u32,
}

impl ExponentialBackoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            current_interval: config.initial_interval(),
            multiplier: config.multiplier,
            randomization_factor: config.randomization_factor,
            max_interval: config.max_interval(),
            max_elapsed_time: config.max_elapsed_time(),
            started_at: Instant::now(),
            retries: 0,
        }
    }

    /// Base interval the next delay will be randomized around
    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    /// Number of delays handed out so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Computes the next retry delay, or `None` once the elapsed budget is spent
    ///
    /// A zero `max_elapsed_time` means retry forever.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = randomize(self.current_interval, self.randomization_factor);

        let grown = self.current_interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::try_from_secs_f64(grown)
            .unwrap_or(self.max_interval)
            .min(self.max_interval);

        if !self.max_elapsed_time.is_zero() && self.elapsed() + delay > self.max_elapsed_time {
            return None;
        }

        self.retries += 1;
        Some(delay)
    }
}

/// Picks a delay uniformly within `interval * (1 +/- factor)`
fn randomize(interval: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || interval.is_zero() {
        return interval;
    }

    let secs = interval.as_secs_f64();
    let delta = secs * factor;
    let jittered = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));
    Duration::from_secs_f64(jittered.max(0.0))
}

/// Runs one attempt, retrying throttled fetches with exponential backoff
#[derive(Debug, Clone, Default)]
pub struct BackoffRetrier {
    config: BackoffConfig,
}

impl BackoffRetrier {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Fetches until a terminal outcome or until the elapsed budget runs out
    ///
    /// # Behavior
    ///
    /// | Fetch outcome | Action |
    /// |---------------|--------|
    /// | Success / Fatal / Cancelled | Returned as is |
    /// | Retryable, budget left | Pacing hint sent, sleep, fetch again |
    /// | Retryable, budget spent | Returned as the final outcome |
    ///
    /// Cancellation during a backoff sleep yields `Cancelled`.
    pub async fn run<S>(
        &self,
        source: &S,
        cancel: &CancellationToken,
        pacing: &PacingSender,
    ) -> FetchOutcome
    where
        S: SummarySource + ?Sized,
    {
        let mut backoff = ExponentialBackoff::new(&self.config);

        loop {
            tracing::debug!(retry = backoff.retries(), "Fetching summary");
            let outcome = source.fetch(cancel).await;

            if !outcome.is_retryable() {
                if backoff.retries() > 0 {
                    tracing::debug!(retries = backoff.retries(), "Attempt finished after backoff");
                }
                return outcome;
            }

            let Some(delay) = backoff.next_delay() else {
                tracing::debug!(
                    retries = backoff.retries(),
                    elapsed_ms = backoff.elapsed().as_millis() as u64,
                    "Backoff budget exhausted, giving up on attempt"
                );
                return outcome;
            };

            tracing::debug!(
                retry = backoff.retries(),
                delay_ms = delay.as_millis() as u64,
                "Throttled, backing off"
            );

            // The dispatcher is gone once the run is shutting down
            let _ = pacing.send(delay);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return FetchOutcome::Cancelled(FetchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
