//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a protected call against a fixed deadline
//! - Turn "too slow" into a typed failure
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities
//! - The operation runs on its own task and is NOT cancelled when the deadline
//!   fires; it finishes in the background and its result is discarded
//! - Panics inside the operation are re-raised on the caller's task

use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Outcome of a deadline-bounded call that did not produce a value.
#[derive(Debug)]
pub enum DeadlineError<E> {
    /// The timer fired first.
    Elapsed(Duration),
    /// The operation finished in time with its own error.
    Inner(E),
}

/// A fixed per-call deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    timeout: Duration,
}

impl Deadline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `fut` to completion or until the deadline, whichever comes first.
    pub async fn run<Fut, T, E>(&self, fut: Fut) -> Result<T, DeadlineError<E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let handle = tokio::spawn(fut);

        match time::timeout(self.timeout, handle).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(DeadlineError::Inner(e)),
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
                // Only reachable when the runtime is shutting down.
                tracing::debug!("Deadline-wrapped task cancelled by runtime");
                Err(DeadlineError::Elapsed(self.timeout))
            }
            Err(_) => {
                // Dropping the JoinHandle detaches the task; it keeps running.
                tracing::debug!(timeout = ?self.timeout, "Deadline elapsed, operation left running");
                Err(DeadlineError::Elapsed(self.timeout))
            }
        }
    }
}
