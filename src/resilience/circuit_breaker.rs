//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: testing if dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures within window >= failure_threshold
//! Open → Half-Open: after reset timeout (lazily, on the next call)
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - Per-dependency circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single trial in Half-Open (prevents hammering recovering dependency)
//! - Timeouts count exactly like thrown failures
//! - Admission is decided synchronously when `execute` is called

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::schema::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::error::{CircuitOpenError, ResilienceError, TimeoutError};
use crate::resilience::timeouts::{Deadline, DeadlineError};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time breaker counters.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failures: u64,
    pub successes: u64,
    pub rejections: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u64,
    success_count: u64,
    rejection_count: u64,
    opened_at: Option<Instant>,
    /// Failure instants inside the sliding window (Closed state only).
    recent_failures: VecDeque<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            rejection_count: 0,
            opened_at: None,
            recent_failures: VecDeque::new(),
            trial_in_flight: false,
        }
    }
}

/// A per-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    deadline: Deadline,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    ///
    /// Values below their minimum (threshold 1, durations 1ms) are raised.
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let service = service.into();
        let clamped = config.clamped();
        if clamped != config {
            tracing::warn!(service = %service, ?config, "Circuit breaker config below minimums, clamping");
        }
        let config = clamped;
        let deadline = Deadline::new(config.timeout());
        Self {
            service,
            config,
            deadline,
            state: Mutex::new(BreakerState::new()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state as last recorded.
    ///
    /// An Open breaker whose cooldown has elapsed still reports Open until the
    /// next call performs the transition.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let s = self.state.lock();
        CircuitBreakerStats {
            state: s.state,
            failures: s.failure_count,
            successes: s.success_count,
            rejections: s.rejection_count,
        }
    }

    /// Force the breaker back to Closed with zeroed counters.
    pub fn reset(&self) {
        let mut s = self.state.lock();
        let previous = s.state;
        *s = BreakerState::new();
        drop(s);

        if previous != CircuitState::Closed {
            tracing::info!(service = %self.service, from = %previous, "Circuit breaker reset");
            metrics::record_circuit_state(&self.service, CircuitState::Closed);
        }
    }

    /// Run `operation` through the breaker under the configured deadline.
    ///
    /// The admission check happens before this returns; a rejected call never
    /// invokes `operation`.
    pub fn execute<'a, F, Fut, T, E>(
        &'a self,
        operation: F,
    ) -> impl Future<Output = Result<T, ResilienceError<E>>> + 'a
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let admission = self.admit();

        async move {
            let mut call = admission?;

            match self.deadline.run(operation()).await {
                Ok(value) => {
                    call.succeeded();
                    Ok(value)
                }
                Err(DeadlineError::Elapsed(timeout)) => {
                    call.failed();
                    Err(ResilienceError::Timeout(TimeoutError {
                        service: self.service.clone(),
                        timeout,
                    }))
                }
                Err(DeadlineError::Inner(e)) => {
                    call.failed();
                    Err(ResilienceError::Operation(e))
                }
            }
        }
    }

    fn admit(&self) -> Result<BreakerCall<'_>, CircuitOpenError> {
        let mut s = self.state.lock();
        let now = Instant::now();

        match s.state {
            CircuitState::Closed => Ok(BreakerCall::new(self, false)),
            CircuitState::Open => {
                let elapsed = s
                    .opened_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);
                let cooldown = self.config.reset_timeout();

                if elapsed >= cooldown {
                    s.state = CircuitState::HalfOpen;
                    s.trial_in_flight = true;
                    drop(s);
                    tracing::info!(service = %self.service, "Circuit breaker half-open, admitting trial call");
                    metrics::record_circuit_state(&self.service, CircuitState::HalfOpen);
                    Ok(BreakerCall::new(self, true))
                } else {
                    s.rejection_count += 1;
                    drop(s);
                    tracing::debug!(service = %self.service, "Circuit open, short-circuiting call");
                    Err(CircuitOpenError {
                        service: self.service.clone(),
                        retry_after: cooldown - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if s.trial_in_flight {
                    s.rejection_count += 1;
                    drop(s);
                    tracing::debug!(service = %self.service, "Trial in flight, short-circuiting call");
                    Err(CircuitOpenError {
                        service: self.service.clone(),
                        retry_after: Duration::ZERO,
                    })
                } else {
                    // Previous trial was abandoned before reporting.
                    s.trial_in_flight = true;
                    Ok(BreakerCall::new(self, true))
                }
            }
        }
    }

    fn record_success(&self, trial: bool) {
        let mut s = self.state.lock();
        s.success_count += 1;

        if trial && s.state == CircuitState::HalfOpen {
            s.state = CircuitState::Closed;
            s.failure_count = 0;
            s.opened_at = None;
            s.recent_failures.clear();
            s.trial_in_flight = false;
            drop(s);
            tracing::info!(service = %self.service, "Circuit breaker closed, trial call succeeded");
            metrics::record_circuit_state(&self.service, CircuitState::Closed);
        }
    }

    fn record_failure(&self, trial: bool) {
        let mut s = self.state.lock();
        let now = Instant::now();
        s.failure_count += 1;

        match s.state {
            CircuitState::HalfOpen if trial => {
                s.state = CircuitState::Open;
                s.opened_at = Some(now);
                s.trial_in_flight = false;
                drop(s);
                tracing::warn!(service = %self.service, "Circuit breaker re-opened, trial call failed");
                metrics::record_circuit_state(&self.service, CircuitState::Open);
            }
            CircuitState::Closed => {
                let window = self.config.window();
                s.recent_failures.push_back(now);
                while let Some(&oldest) = s.recent_failures.front() {
                    if now.saturating_duration_since(oldest) >= window {
                        s.recent_failures.pop_front();
                    } else {
                        break;
                    }
                }

                let in_window = s.recent_failures.len() as u64;
                if in_window >= u64::from(self.config.failure_threshold) {
                    s.state = CircuitState::Open;
                    s.opened_at = Some(now);
                    s.recent_failures.clear();
                    drop(s);
                    tracing::warn!(
                        service = %self.service,
                        failures = in_window,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker opened"
                    );
                    metrics::record_circuit_state(&self.service, CircuitState::Open);
                }
            }
            // Late results from calls admitted before the breaker tripped.
            _ => {}
        }
    }

    fn release_trial(&self) {
        let mut s = self.state.lock();
        if s.state == CircuitState::HalfOpen {
            s.trial_in_flight = false;
        }
    }
}

/// An admitted call; reports its outcome back to the breaker exactly once.
struct BreakerCall<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> BreakerCall<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    fn succeeded(&mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    fn failed(&mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }
}

impl Drop for BreakerCall<'_> {
    fn drop(&mut self) {
        // Caller dropped the future mid-trial: let the next call probe instead.
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                window_ms: 60_000,
                reset_timeout_ms: 1_000,
                timeout_ms: 500,
            },
        )
    }

    async fn fail(cb: &CircuitBreaker) -> ResilienceError<&'static str> {
        cb.execute(|| async { Err::<(), _>("down") }).await.unwrap_err()
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<u32, ResilienceError<&'static str>> {
        cb.execute(|| async { Ok(1) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let cb = breaker(3);
        for _ in 0..2 {
            assert!(matches!(fail(&cb).await, ResilienceError::Operation("down")));
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = cb
            .execute(move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, &'static str>(()) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResilienceError::CircuitOpen(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cb.stats().rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_window_do_not_count() {
        let cb = CircuitBreaker::new(
            "windowed",
            CircuitBreakerConfig {
                failure_threshold: 2,
                window_ms: 1_000,
                reset_timeout_ms: 1_000,
                timeout_ms: 500,
            },
        );
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let cb = breaker(1);
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(matches!(succeed(&cb).await, Err(ResilienceError::CircuitOpen(_))));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(succeed(&cb).await.unwrap(), 1);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_restarts_cooldown() {
        let cb = breaker(1);
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        assert!(matches!(fail(&cb).await, ResilienceError::Operation(_)));
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(succeed(&cb).await, Err(ResilienceError::CircuitOpen(_))));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trial_in_half_open() {
        let cb = breaker(1);
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        let trial = cb.execute(|| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, &'static str>(())
        });
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // A second caller while the trial is running is short-circuited.
        assert!(matches!(succeed(&cb).await, Err(ResilienceError::CircuitOpen(_))));

        trial.await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let cb = breaker(1);
        let start = Instant::now();
        let err = cb
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, &'static str>(())
            })
            .await
            .unwrap_err();

        match err {
            ResilienceError::Timeout(t) => assert_eq!(t.timeout, Duration::from_millis(500)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_millis(600));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_threshold_is_clamped_to_one() {
        let cb = CircuitBreaker::new(
            "zero",
            CircuitBreakerConfig {
                failure_threshold: 0,
                window_ms: 60_000,
                reset_timeout_ms: 1_000,
                timeout_ms: 500,
            },
        );
        assert_eq!(cb.config().failure_threshold, 1);
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_may_borrow_caller_state() {
        let cb = breaker(3);
        let label = String::from("vector-search");
        let value = cb
            .execute(|| {
                let owned = label.clone();
                async move { Ok::<_, &'static str>(owned.len()) }
            })
            .await
            .unwrap();
        assert_eq!(value, label.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let cb = breaker(1);
        fail(&cb).await;
        let _ = succeed(&cb).await;
        cb.reset();
        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failures + stats.successes + stats.rejections, 0);
    }
}
