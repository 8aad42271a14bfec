//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resilience_guard::config::{BulkheadConfig, CircuitBreakerConfig, ResilienceConfig};
use resilience_guard::resilience::Tier;

/// Error type returned by test operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency failed: {0}")]
pub struct DependencyError(pub &'static str);

/// Counts how many times an operation was actually invoked.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

#[allow(dead_code)]
impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

#[allow(dead_code)]
pub fn breaker_config(
    failure_threshold: u32,
    window_ms: u64,
    reset_timeout_ms: u64,
    timeout_ms: u64,
) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        window_ms,
        reset_timeout_ms,
        timeout_ms,
    }
}

#[allow(dead_code)]
pub fn bulkhead_config(max_concurrent: usize, max_queue_size: usize) -> BulkheadConfig {
    BulkheadConfig {
        tier: Tier::Standard,
        max_concurrent: Some(max_concurrent),
        max_queue_size: Some(max_queue_size),
    }
}

#[allow(dead_code)]
pub fn manager_config(breaker: CircuitBreakerConfig, bulkhead: BulkheadConfig) -> ResilienceConfig {
    ResilienceConfig {
        enable_circuit_breaker: true,
        enable_bulkhead: true,
        circuit_breaker: breaker,
        bulkhead,
    }
}

/// Sleep for `ms` milliseconds, then succeed with `value`.
#[allow(dead_code)]
pub async fn slow_ok<T>(ms: u64, value: T) -> Result<T, DependencyError> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(value)
}
