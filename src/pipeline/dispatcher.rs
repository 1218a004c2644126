//! Dispatch loop starting fetch attempts
//!
//! This module handles:
//! - Pacing attempt starts through the shared [`RateGate`]
//! - Pausing dispatch when throttled attempts report backoff delays
//! - Spawning each attempt as its own task and routing its outcome
//! - Optional cap on attempts in flight via a semaphore

use crate::pipeline::backoff::{BackoffRetrier, PacingReceiver, PacingSender};
use crate::pipeline::fetcher::{FetchError, FetchResult, SummarySource};
use crate::pipeline::rate_gate::{GateStatus, RateGate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Long-lived loop that starts one attempt per gate token
///
/// Attempts run fully concurrently. Their outcomes go to the results or
/// errors channel; the dispatcher itself never waits for them.
pub struct Dispatcher<S: ?Sized> {
    source: Arc<S>,
    gate: Arc<RateGate>,
    retrier: Arc<BackoffRetrier>,
    results: mpsc::Sender<FetchResult>,
    errors: mpsc::Sender<FetchError>,
    pacing_tx: PacingSender,
    pacing_rx: PacingReceiver,
    in_flight: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl<S> Dispatcher<S>
where
    S: SummarySource + ?Sized + 'static,
{
    /// Creates a dispatcher with no cap on attempts in flight
    ///
    /// # Arguments
    ///
    /// * `source` - Fetches one summary per call
    /// * `gate` - Paces attempt starts
    /// * `retrier` - Wraps every attempt
    /// * `results` / `errors` - Where attempt outcomes are delivered
    /// * `cancel` - Shared run context; the loop exits once it fires
    pub fn new(
        source: Arc<S>,
        gate: Arc<RateGate>,
        retrier: Arc<BackoffRetrier>,
        results: mpsc::Sender<FetchResult>,
        errors: mpsc::Sender<FetchError>,
        cancel: CancellationToken,
    ) -> Self {
        let (pacing_tx, pacing_rx) = mpsc::unbounded_channel();

        Self {
            source,
            gate,
            retrier,
            results,
            errors,
            pacing_tx,
            pacing_rx,
            in_flight: None,
            cancel,
        }
    }

    /// Caps the number of attempts in flight (0 keeps it unbounded)
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.in_flight = (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight)));
        self
    }

    /// Handle for reporting backoff delays to this dispatcher
    pub fn pacing_sender(&self) -> PacingSender {
        self.pacing_tx.clone()
    }

    /// Runs until the shared context is cancelled
    ///
    /// # Returns
    ///
    /// The number of attempts started
    pub async fn run(mut self) -> u64 {
        let mut dispatched = 0u64;

        loop {
            if let Some(pause) = self.drain_pacing_hints() {
                tracing::debug!(pause_ms = pause.as_millis() as u64, "Upstream throttling, pausing dispatch");
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }

            if self.gate.acquire(&self.cancel).await == GateStatus::Cancelled {
                break;
            }

            let permit = match &self.in_flight {
                Some(semaphore) => {
                    let acquired = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        permit = semaphore.clone().acquire_owned() => permit,
                    };
                    match acquired {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    }
                }
                None => None,
            };

            self.spawn_attempt(permit);
            dispatched += 1;
        }

        tracing::debug!(dispatched, "Dispatcher stopped");
        dispatched
    }

    /// Empties the pacing channel without blocking
    ///
    /// Returns the longest pending delay, if any attempt reported one.
    fn drain_pacing_hints(&mut self) -> Option<Duration> {
        let mut longest: Option<Duration> = None;
        while let Ok(delay) = self.pacing_rx.try_recv() {
            longest = Some(longest.map_or(delay, |current| current.max(delay)));
        }
        longest
    }

    fn spawn_attempt(&self, permit: Option<OwnedSemaphorePermit>) {
        let source = Arc::clone(&self.source);
        let retrier = Arc::clone(&self.retrier);
        let results = self.results.clone();
        let errors = self.errors.clone();
        let pacing = self.pacing_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let outcome = retrier.run(source.as_ref(), &cancel, &pacing).await;

            // Send failures mean the aggregator is done and discards late outcomes
            match outcome.into_result() {
                Ok(result) => {
                    let _ = results.send(result).await;
                }
                Err(error) => {
                    let _ = errors.send(error).await;
                }
            }
        });
    }
}
