//! Error taxonomy for protected calls.
//!
//! # Variants
//! - `CircuitOpen`: breaker short-circuited the call, dependency not invoked
//! - `Timeout`: deadline exceeded, counted as a breaker failure
//! - `BulkheadRejected`: call never admitted (capacity or shutdown)
//! - `Operation`: the wrapped operation's own error, passed through unchanged
//!
//! # Design Decisions
//! - Nothing here is retried or swallowed; recovery belongs to the caller
//! - Error types carry the service name so logs need no extra context

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::bulkhead::Tier;

/// Breaker is open; the call was short-circuited.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker for '{service}' is open (retry in {retry_after:?})")]
pub struct CircuitOpenError {
    pub service: String,
    /// Remaining cooldown before a trial call is allowed.
    pub retry_after: Duration,
}

/// Operation exceeded its configured deadline.
#[derive(Debug, Clone, Error)]
#[error("call to '{service}' timed out after {timeout:?}")]
pub struct TimeoutError {
    pub service: String,
    pub timeout: Duration,
}

/// Why a bulkhead refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Concurrency and queue are both full.
    CapacityExhausted,
    /// Queued entry was dropped by `clear()`.
    Shutdown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::CapacityExhausted => f.write_str("capacity exhausted"),
            RejectReason::Shutdown => f.write_str("shutting down"),
        }
    }
}

/// Bulkhead refused admission.
#[derive(Debug, Clone, Error)]
#[error("bulkhead for '{service}' [{tier}] rejected call: {reason} (running {running}/{max_concurrent}, queued {queued}/{max_queue_size})")]
pub struct BulkheadRejectedError {
    pub service: String,
    pub tier: Tier,
    pub reason: RejectReason,
    pub running: usize,
    pub max_concurrent: usize,
    pub queued: usize,
    pub max_queue_size: usize,
}

/// Error returned by every protected `execute` path.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    BulkheadRejected(#[from] BulkheadRejectedError),

    #[error(transparent)]
    Operation(E),
}

impl<E> ResilienceError<E> {
    /// True for fast-fail rejections (open circuit or full bulkhead).
    ///
    /// API boundaries map these to "service temporarily unavailable".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ResilienceError::CircuitOpen(_) | ResilienceError::BulkheadRejected(_)
        )
    }

    /// True when the deadline fired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout(_))
    }

    /// Borrow the operation's own error, if that is what failed.
    pub fn operation(&self) -> Option<&E> {
        match self {
            ResilienceError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Take the operation's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            ResilienceError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResilienceError::CircuitOpen(_) => "short_circuited",
            ResilienceError::Timeout(_) => "timeout",
            ResilienceError::BulkheadRejected(_) => "rejected",
            ResilienceError::Operation(_) => "failure",
        }
    }
}
