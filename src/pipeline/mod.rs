//! Concurrent retrieval pipeline
//!
//! This module contains the moving parts of a run:
//! - Rate-limited dispatch of fetch attempts
//! - Fetching and classifying single summaries
//! - Exponential backoff for throttled attempts
//! - Aggregation of outcomes into the output sink
//! - Coordination and shutdown of a whole run

mod aggregator;
mod backoff;
mod coordinator;
mod dispatcher;
mod fetcher;
mod rate_gate;

pub use aggregator::{should_report, Aggregator};
pub use backoff::{BackoffRetrier, ExponentialBackoff, PacingReceiver, PacingSender};
pub use coordinator::{Coordinator, StopHandle};
pub use dispatcher::Dispatcher;
pub use fetcher::{
    build_http_client, classify_response, ErrorKind, FetchError, FetchOutcome, FetchResult,
    SummaryFetcher, SummarySource,
};
pub use rate_gate::{GateStatus, RateGate};
