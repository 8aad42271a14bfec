//! Resilience manager: one named dependency's breaker and bulkhead.
//!
//! # Call Path
//! ```text
//! execute(op)
//!     → bulkhead.admit()          (run now / queue / reject)
//!     → wait for slot
//!     → circuit_breaker.execute() (fast-fail / deadline-wrapped call)
//!     → slot released
//! ```
//!
//! # Design Decisions
//! - Bulkhead outside, breaker inside: capacity rejections are a property of
//!   our own budget and must not count as dependency failures
//! - A queued call consults the breaker only once it holds a slot, so it sees
//!   the breaker state at start time rather than arrival time
//! - Either component may be disabled; disabled components are absent from
//!   stats rather than reported as empty

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{self, Instant};

use crate::config::schema::ResilienceConfig;
use crate::observability::metrics;
use crate::resilience::bulkhead::{Admission, Bulkhead, BulkheadStats};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
use crate::resilience::error::{BulkheadRejectedError, ResilienceError};

/// Aggregated stats for one manager.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulkhead: Option<BulkheadStats>,
}

/// Breaker + bulkhead pair for a single named dependency.
#[derive(Debug)]
pub struct ResilienceManager {
    service: String,
    config: ResilienceConfig,
    circuit_breaker: Option<CircuitBreaker>,
    bulkhead: Option<Bulkhead>,
}

impl ResilienceManager {
    pub fn new(service: impl Into<String>, mut config: ResilienceConfig) -> Self {
        let service = service.into();
        let circuit_breaker = config
            .enable_circuit_breaker
            .then(|| CircuitBreaker::new(service.clone(), config.circuit_breaker.clone()));
        let bulkhead = config
            .enable_bulkhead
            .then(|| Bulkhead::new(service.clone(), &config.bulkhead));

        // Keep the reported config in line with what the components enforce.
        config.circuit_breaker = config.circuit_breaker.clamped();
        config.bulkhead.max_concurrent = config
            .bulkhead
            .max_concurrent
            .map(|_| config.bulkhead.max_concurrent());

        Self {
            service,
            config,
            circuit_breaker,
            bulkhead,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// The configuration in effect, with minimums applied.
    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        self.circuit_breaker.as_ref()
    }

    pub fn bulkhead(&self) -> Option<&Bulkhead> {
        self.bulkhead.as_ref()
    }

    /// Breaker state, if a breaker is configured.
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.circuit_breaker.as_ref().map(CircuitBreaker::state)
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            circuit_breaker: self.circuit_breaker.as_ref().map(CircuitBreaker::stats),
            bulkhead: self.bulkhead.as_ref().map(Bulkhead::stats),
        }
    }

    /// Run `operation` behind the bulkhead and circuit breaker.
    ///
    /// Bulkhead admission is decided before this returns.
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
        let admission = self.bulkhead.as_ref().map(Bulkhead::admit);
        let start = Instant::now();

        async move {
            let result = self.run(admission, operation).await;
            let outcome = match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            };
            metrics::record_call(&self.service, outcome, start.elapsed());
            result
        }
    }

    async fn run<F, Fut, T, E>(
        &self,
        admission: Option<Result<Admission, BulkheadRejectedError>>,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let _permit = match admission {
            Some(admission) => Some(admission?.wait().await?),
            None => None,
        };

        match &self.circuit_breaker {
            Some(breaker) => breaker.execute(operation).await,
            None => operation().await.map_err(ResilienceError::Operation),
        }
    }

    /// Close the breaker with zeroed counters and drop queued calls.
    pub fn reset(&self) {
        if let Some(breaker) = &self.circuit_breaker {
            breaker.reset();
        }
        if let Some(bulkhead) = &self.bulkhead {
            bulkhead.clear();
        }
    }

    /// Wait for in-flight and queued work, up to `drain_timeout`.
    ///
    /// Anything still queued at the deadline is rejected.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        let Some(bulkhead) = &self.bulkhead else {
            return;
        };

        if time::timeout(drain_timeout, bulkhead.drain()).await.is_err() {
            let stats = bulkhead.stats();
            tracing::warn!(
                service = %self.service,
                running = stats.current_concurrent,
                queued = stats.queue_size,
                "Drain timed out, clearing queued calls"
            );
            bulkhead.clear();
        }
    }
}
