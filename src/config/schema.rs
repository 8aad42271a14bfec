//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::resilience::bulkhead::Tier;

/// Smallest accepted `failure_threshold`.
pub const MIN_FAILURE_THRESHOLD: u32 = 1;
/// Smallest accepted window, cooldown and timeout, in milliseconds.
pub const MIN_DURATION_MS: u64 = 1;
/// Smallest accepted `max_concurrent`.
pub const MIN_CONCURRENCY: usize = 1;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Settings applied to any service without its own entry.
    pub defaults: ResilienceConfig,

    /// Per-service settings keyed by service name.
    pub services: HashMap<String, ResilienceConfig>,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shutdown behaviour.
    pub lifecycle: LifecycleConfig,
}

impl GuardConfig {
    /// The part of the configuration the registry consumes.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            defaults: self.defaults.clone(),
            services: self.services.clone(),
        }
    }
}

/// Manager settings resolved by the registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub defaults: ResilienceConfig,
    pub services: HashMap<String, ResilienceConfig>,
}

impl RegistryConfig {
    /// Per-service entry if present, otherwise the defaults.
    pub fn resolve(&self, service: &str) -> ResilienceConfig {
        self.services
            .get(service)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }
}

/// Settings for one resilience manager.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub enable_circuit_breaker: bool,
    pub enable_bulkhead: bool,
    pub circuit_breaker: CircuitBreakerConfig,
    pub bulkhead: BulkheadConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            enable_circuit_breaker: true,
            enable_bulkhead: true,
            circuit_breaker: CircuitBreakerConfig::default(),
            bulkhead: BulkheadConfig::default(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures within the window that open the circuit.
    pub failure_threshold: u32,

    /// Sliding window over which failures are counted, in milliseconds.
    pub window_ms: u64,

    /// Cooldown before a trial call is allowed, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,
}

impl CircuitBreakerConfig {
    /// Copy with every value raised to its minimum.
    ///
    /// Configs built in code skip file validation; constructors call this so
    /// a zero threshold or duration cannot reach the breaker.
    pub fn clamped(&self) -> Self {
        Self {
            failure_threshold: self.failure_threshold.max(MIN_FAILURE_THRESHOLD),
            window_ms: self.window_ms.max(MIN_DURATION_MS),
            reset_timeout_ms: self.reset_timeout_ms.max(MIN_DURATION_MS),
            timeout_ms: self.timeout_ms.max(MIN_DURATION_MS),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_ms: 60_000,
            reset_timeout_ms: 30_000,
            timeout_ms: 30_000,
        }
    }
}

/// Bulkhead configuration.
///
/// Unset limits fall back to the tier's preset.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BulkheadConfig {
    pub tier: Tier,
    pub max_concurrent: Option<usize>,
    pub max_queue_size: Option<usize>,
}

impl BulkheadConfig {
    pub fn for_tier(tier: Tier) -> Self {
        Self {
            tier,
            max_concurrent: None,
            max_queue_size: None,
        }
    }

    /// Effective concurrency limit, never below `MIN_CONCURRENCY`.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
            .unwrap_or(self.tier.default_limits().0)
            .max(MIN_CONCURRENCY)
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size.unwrap_or(self.tier.default_limits().1)
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long `destroy_all` waits for in-flight work, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl LifecycleConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: 10_000,
        }
    }
}
