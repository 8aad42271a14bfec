//! Registry of named resilience managers.
//!
//! # Responsibilities
//! - Hand out exactly one manager per service name
//! - Resolve configuration for new managers (explicit > per-service > defaults)
//! - Bulk stats, reset, and teardown for health checks and shutdown
//!
//! # Design Decisions
//! - Constructed explicitly at startup and shared via `Arc`; no global state
//! - Creation goes through the `DashMap` entry API so concurrent first calls
//!   for a name agree on a single instance
//! - The first call for a name fixes that manager's configuration; config
//!   passed later (or hot-reloaded) only affects names not yet created

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures_util::future::join_all;

use crate::config::schema::{RegistryConfig, ResilienceConfig};
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::manager::{ManagerStats, ResilienceManager};

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Name → manager cache.
#[derive(Debug)]
pub struct Registry {
    managers: DashMap<String, Arc<ResilienceManager>>,
    config: ArcSwap<RegistryConfig>,
    drain_timeout: Duration,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            managers: DashMap::new(),
            config: ArcSwap::from_pointee(config),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Bound how long `destroy_all` waits for each manager to go idle.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Return the manager for `service`, creating it on first use.
    ///
    /// `config` is only consulted when the manager does not exist yet.
    pub fn get_or_create(
        &self,
        service: &str,
        config: Option<ResilienceConfig>,
    ) -> Arc<ResilienceManager> {
        if let Some(existing) = self.managers.get(service) {
            return Arc::clone(existing.value());
        }

        let entry = self.managers.entry(service.to_string()).or_insert_with(|| {
            let config = config.unwrap_or_else(|| self.config_for(service));
            tracing::info!(
                service = %service,
                circuit_breaker = config.enable_circuit_breaker,
                bulkhead = config.enable_bulkhead,
                tier = %config.bulkhead.tier,
                "Creating resilience manager"
            );
            Arc::new(ResilienceManager::new(service, config))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, service: &str) -> Option<Arc<ResilienceManager>> {
        self.managers.get(service).map(|m| Arc::clone(m.value()))
    }

    /// Configuration a new manager named `service` would receive.
    pub fn config_for(&self, service: &str) -> ResilienceConfig {
        self.config.load().resolve(service)
    }

    /// Replace the configuration table used for managers created from now on.
    pub fn apply_config(&self, config: RegistryConfig) {
        let services = config.services.len();
        self.config.store(Arc::new(config));
        tracing::info!(
            services,
            existing_managers = self.managers.len(),
            "Registry configuration updated; existing managers keep their settings"
        );
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.managers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    pub fn all_stats(&self) -> BTreeMap<String, ManagerStats> {
        self.managers
            .iter()
            .map(|e| (e.key().clone(), e.value().stats()))
            .collect()
    }

    /// Names of services whose circuit is currently open, sorted.
    pub fn open_circuits(&self) -> Vec<String> {
        let mut open: Vec<String> = self
            .managers
            .iter()
            .filter(|e| e.value().circuit_state() == Some(CircuitState::Open))
            .map(|e| e.key().clone())
            .collect();
        open.sort();
        open
    }

    /// Close every breaker and drop every queued call. Entries are kept.
    pub fn reset_all(&self) {
        let managers: Vec<Arc<ResilienceManager>> =
            self.managers.iter().map(|e| Arc::clone(e.value())).collect();
        for manager in &managers {
            manager.reset();
        }
        tracing::info!(count = managers.len(), "Reset all resilience managers");
    }

    /// Drain and remove every manager.
    ///
    /// Each manager gets `drain_timeout` to finish in-flight and queued work;
    /// queued calls still waiting after that are rejected.
    pub async fn destroy_all(&self) {
        let names: Vec<String> = self.managers.iter().map(|e| e.key().clone()).collect();
        let managers: Vec<Arc<ResilienceManager>> = names
            .iter()
            .filter_map(|name| self.managers.remove(name).map(|(_, m)| m))
            .collect();

        tracing::info!(
            count = managers.len(),
            drain_timeout = ?self.drain_timeout,
            "Tearing down resilience managers"
        );
        join_all(managers.iter().map(|m| m.shutdown(self.drain_timeout))).await;
        tracing::info!("All resilience managers torn down");
    }
}
