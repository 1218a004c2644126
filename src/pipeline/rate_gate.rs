//! Token-bucket gate pacing how often new attempts may start
//!
//! The bucket holds at most one token and starts full, so the first caller
//! passes immediately and later callers are spaced `1 / rate` seconds apart.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tolerance for float drift when the refill lands just short of a token
const EPSILON: f64 = 1e-9;

/// Shortest wait handed out; a shortfall that rounds to zero must still let time pass
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Result of waiting on the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// A token was taken; the caller may start one attempt
    Acquired,
    /// The run was cancelled before a token became available
    Cancelled,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with capacity 1, refilled continuously at `rate` tokens/s
///
/// The gate enforces whatever rate it is given; clamping to the API maximum
/// happens in configuration. Safe to share between tasks: the lock is only
/// held for the arithmetic, never across an `.await`.
#[derive(Debug)]
pub struct RateGate {
    rate: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

impl RateGate {
    /// Creates a full gate refilling at `rate` tokens per second
    pub fn new(rate: f64) -> Self {
        let capacity = 1.0;
        Self {
            rate,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Tokens currently in the bucket, after refilling up to now
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    /// Takes a token if one is available
    ///
    /// # Returns
    ///
    /// * `Ok(())` - A token was taken
    /// * `Err(Duration)` - How long until the next token is due
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket, Instant::now());

        if bucket.tokens + EPSILON >= 1.0 {
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
            return Ok(());
        }

        let missing = 1.0 - bucket.tokens;
        let wait = Duration::try_from_secs_f64(missing / self.rate).unwrap_or(Duration::MAX);
        Err(wait.max(MIN_WAIT))
    }

    /// Waits for a token or for cancellation, whichever comes first
    pub async fn acquire(&self, cancel: &CancellationToken) -> GateStatus {
        loop {
            if cancel.is_cancelled() {
                return GateStatus::Cancelled;
            }

            let wait = match self.try_acquire() {
                Ok(()) => return GateStatus::Acquired,
                Err(wait) => wait,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return GateStatus::Cancelled,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        bucket.last_refill = now;
    }
}
