//! Statistics for a single run
//!
//! The aggregator fills a [`RunSummary`] as outcomes arrive; the coordinator
//! completes it and [`log_summary`] reports it once the run is over.

use crate::pipeline::ErrorKind;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Why the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured target length was written
    TargetReached,
    /// An external stop request arrived
    Interrupted,
    /// Every producer went away before a target was reached
    SourcesClosed,
}

/// Run summary statistics
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run ended (None while running)
    pub finished_at: Option<DateTime<Utc>>,

    /// Number of attempts the dispatcher started
    pub dispatched: u64,

    /// Number of snippets written to the sink
    pub snippets_written: u64,

    /// Bytes written, separators included
    pub bytes_written: usize,

    /// Configured target length (0 = unbounded)
    pub target_length: usize,

    /// Failed attempts by kind
    pub errors_by_kind: HashMap<ErrorKind, u64>,

    /// Why the run ended (None while running)
    pub stop_reason: Option<StopReason>,
}

impl RunSummary {
    /// Creates an empty summary starting now
    pub fn new(target_length: usize) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dispatched: 0,
            snippets_written: 0,
            bytes_written: 0,
            target_length,
            errors_by_kind: HashMap::new(),
            stop_reason: None,
        }
    }

    pub fn record_snippet(&mut self, bytes: usize) {
        self.snippets_written += 1;
        self.bytes_written += bytes;
    }

    pub fn record_error(&mut self, kind: ErrorKind) {
        *self.errors_by_kind.entry(kind).or_insert(0) += 1;
    }

    pub fn finish(&mut self, reason: StopReason) {
        self.finished_at = Some(Utc::now());
        self.stop_reason = Some(reason);
    }

    /// Number of failed attempts of one kind
    pub fn errors(&self, kind: ErrorKind) -> u64 {
        self.errors_by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Total number of failed attempts
    pub fn error_count(&self) -> u64 {
        self.errors_by_kind.values().sum()
    }

    /// Run duration in seconds, if finished
    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Share of completed attempts that produced a snippet, as a percentage
    pub fn success_rate(&self) -> f64 {
        let completed = self.snippets_written + self.error_count();
        if completed == 0 {
            return 0.0;
        }
        (self.snippets_written as f64 / completed as f64) * 100.0
    }
}

/// Logs the summary at info level
///
/// Standard output carries the generated text, so the summary goes through
/// the diagnostic channel instead of being printed.
pub fn log_summary(summary: &RunSummary) {
    tracing::info!(
        reason = ?summary.stop_reason,
        duration_s = summary.duration_seconds().unwrap_or_default(),
        "Run finished"
    );
    tracing::info!(
        "Wrote {} bytes in {} snippets (target: {})",
        summary.bytes_written,
        summary.snippets_written,
        if summary.target_length > 0 {
            summary.target_length.to_string()
        } else {
            "unbounded".to_string()
        }
    );
    tracing::info!(
        "Attempts: {} dispatched, {:.1}% successful",
        summary.dispatched,
        summary.success_rate()
    );

    if summary.error_count() > 0 {
        let mut error_counts: Vec<_> = summary.errors_by_kind.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in error_counts {
            tracing::info!("  {:?}: {}", kind, count);
        }
    }
}
