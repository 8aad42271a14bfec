//! Dependency health reporting.
//!
//! # Data Flow
//! ```text
//! Registry
//!     → all_stats() / open_circuits()
//!     → HealthReport (healthy | degraded)
//!     → admin API / shutdown logs
//! ```
//!
//! # Design Decisions
//! - Health is derived from breaker state only; a busy bulkhead is not unhealthy
//! - Any open circuit marks the whole process degraded
//! - The report is a snapshot; nothing here mutates managers

use std::collections::BTreeMap;

use serde::Serialize;

use crate::resilience::manager::ManagerStats;
use crate::resilience::registry::Registry;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Snapshot of every managed dependency.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub open_circuits: Vec<String>,
    pub services: BTreeMap<String, ManagerStats>,
}

impl HealthReport {
    pub fn from_registry(registry: &Registry) -> Self {
        let open_circuits = registry.open_circuits();
        let status = if open_circuits.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            open_circuits,
            services: registry.all_stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ResilienceConfig;

    #[tokio::test]
    async fn test_open_circuit_degrades() {
        let registry = Registry::default();
        let mut cfg = ResilienceConfig::default();
        cfg.circuit_breaker.failure_threshold = 1;
        let flaky = registry.get_or_create("flaky", Some(cfg));
        registry.get_or_create("steady", None);

        assert!(HealthReport::from_registry(&registry).status.is_healthy());

        let _ = flaky.execute(|| async { Err::<(), _>("down") }).await;
        let report = HealthReport::from_registry(&registry);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.open_circuits, vec!["flaky".to_string()]);
        assert_eq!(report.services.len(), 2);
    }
}
