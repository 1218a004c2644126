//! Aggregation of attempt outcomes
//!
//! The aggregator is the only consumer of the results and errors channels and
//! the only owner of output state. It writes snippets in completion order,
//! counts bytes, reports errors, and ends the run by cancelling the shared
//! context once the target is reached or a stop is requested.

use crate::output::{RunSummary, SnippetWriter, StopReason};
use crate::pipeline::fetcher::{ErrorKind, FetchError, FetchResult};
use crate::Result;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Decides whether a failed attempt is worth a diagnostic
///
/// Throttling, cancellation and timeouts are expected under load and are
/// only reported in verbose mode; everything else is always reported.
pub fn should_report(error: &FetchError, verbose: bool) -> bool {
    verbose
        || !matches!(
            error.kind(),
            ErrorKind::Throttled | ErrorKind::Cancelled | ErrorKind::Transient
        )
}

/// Single consumer of every attempt outcome
pub struct Aggregator<W> {
    writer: SnippetWriter<W>,
    verbose: bool,
    summary: RunSummary,
}

impl<W> Aggregator<W>
where
    W: AsyncWrite + Unpin,
{
    /// Creates an aggregator writing to `sink`
    ///
    /// # Arguments
    ///
    /// * `sink` - Output stream for snippets
    /// * `target_length` - Bytes after which the run ends (0 = unbounded)
    /// * `verbose` - Report expected errors too
    pub fn new(sink: W, target_length: usize, verbose: bool) -> Self {
        Self {
            writer: SnippetWriter::new(sink, target_length),
            verbose,
            summary: RunSummary::new(target_length),
        }
    }

    /// Consumes outcomes until the run is over
    ///
    /// The run is over when the target length has been written, when `stop`
    /// fires, or when both channels are closed. In every case `cancel` is
    /// cancelled before returning and both receivers are dropped, so late
    /// outcomes are discarded by their senders.
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Statistics of the finished run (dispatch count not included)
    /// * `Err(IpsumError)` - Writing to the sink failed; the run is cancelled
    pub async fn run(
        mut self,
        mut results: mpsc::Receiver<FetchResult>,
        mut errors: mpsc::Receiver<FetchError>,
        stop: CancellationToken,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let mut results_closed = false;
        let mut errors_closed = false;

        let reason = loop {
            if self.writer.target_reached() {
                break StopReason::TargetReached;
            }
            if results_closed && errors_closed {
                break StopReason::SourcesClosed;
            }

            tokio::select! {
                biased;
                _ = stop.cancelled() => break StopReason::Interrupted,
                received = results.recv(), if !results_closed => match received {
                    Some(result) => {
                        if let Err(e) = self.handle_result(&result).await {
                            cancel.cancel();
                            return Err(e.into());
                        }
                    }
                    None => results_closed = true,
                },
                received = errors.recv(), if !errors_closed => match received {
                    Some(error) => self.handle_error(&error),
                    None => errors_closed = true,
                },
            }
        };

        self.writer.terminate();
        cancel.cancel();
        self.summary.finish(reason);

        tracing::debug!(
            reason = ?reason,
            bytes_written = self.writer.written(),
            "Aggregator done"
        );

        Ok(self.summary)
    }

    async fn handle_result(&mut self, result: &FetchResult) -> std::io::Result<()> {
        let written = self.writer.write_snippet(result.text()).await?;
        self.summary.record_snippet(written);
        Ok(())
    }

    fn handle_error(&mut self, error: &FetchError) {
        let kind = error.kind();
        self.summary.record_error(kind);

        if should_report(error, self.verbose) {
            tracing::warn!(kind = ?kind, "Attempt failed: {}", error);
        } else {
            tracing::trace!(kind = ?kind, "Attempt failed: {}", error);
        }
    }
}
