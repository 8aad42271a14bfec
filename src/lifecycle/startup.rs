//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry from configuration
//! - Start background tasks (metrics exporter, config watcher, admin API)
//! - Tear everything down in order when a shutdown signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The registry is created here and handed out by `Arc`; host applications
//!   embedding the guard pass their own instance to `run_until_shutdown`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::admin::{bind_admin, serve_admin, AdminState};
use crate::config::watcher::ConfigWatcher;
use crate::config::{ConfigError, GuardConfig};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_signal;
use crate::observability::metrics;
use crate::resilience::registry::Registry;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("config watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("admin API error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build a registry from configuration, pre-creating every configured service.
pub fn build_registry(config: &GuardConfig) -> Arc<Registry> {
    let registry = Arc::new(
        Registry::new(config.registry_config()).with_drain_timeout(config.lifecycle.drain_timeout()),
    );

    let mut names: Vec<&String> = config.services.keys().collect();
    names.sort();
    for name in names {
        registry.get_or_create(name, None);
    }
    registry
}

/// Feed validated config reloads into the registry until shutdown.
pub fn spawn_reload_task(
    registry: Arc<Registry>,
    mut updates: mpsc::UnboundedReceiver<GuardConfig>,
    mut stop: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(new_config) = updates.recv() => {
                    registry.apply_config(new_config.registry_config());
                }
                _ = stop.recv() => break,
                else => break,
            }
        }
    })
}

/// Run background services until SIGINT/SIGTERM, then tear down.
///
/// The admin listener is bound before anything is reported ready, so a
/// taken address fails startup.
pub async fn run_until_shutdown(
    config: GuardConfig,
    registry: Arc<Registry>,
    config_path: Option<PathBuf>,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let admin_listener = if config.admin.enabled {
        Some(bind_admin(&config.admin).await?)
    } else {
        None
    };

    let shutdown = Shutdown::new();

    // Watcher handle must outlive the loop below.
    let _watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            let handle = watcher.run()?;
            spawn_reload_task(Arc::clone(&registry), updates, shutdown.subscribe());
            Some(handle)
        }
        None => None,
    };

    let admin_task = admin_listener.map(|listener| {
        let state = AdminState::new(Arc::clone(&registry), &config.admin.api_key);
        tokio::spawn(serve_admin(listener, state, shutdown.subscribe()))
    });

    tracing::info!(services = registry.len(), "resilience-guard ready");
    wait_for_signal().await;

    shutdown.teardown(&registry).await;

    if let Some(task) = admin_task {
        match task.await {
            Ok(result) => result?,
            Err(e) => tracing::error!(error = %e, "Admin task failed"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use std::time::Duration;

    #[tokio::test]
    async fn test_taken_admin_address_fails_startup() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = occupied.local_addr().unwrap();

        let mut config = GuardConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "test-key".to_string();
        config.admin.bind_address = addr.to_string();
        config.observability.metrics_enabled = false;
        let registry = build_registry(&config);

        let result = tokio::time::timeout(
            Duration::from_millis(500),
            run_until_shutdown(config, registry, None),
        )
        .await
        .expect("startup should fail instead of waiting for a signal");
        assert!(matches!(result, Err(StartupError::Io(_))));
    }

    #[tokio::test]
    async fn test_reload_task_updates_registry_until_stopped() {
        let registry = Arc::new(Registry::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let task = spawn_reload_task(Arc::clone(&registry), rx, shutdown.subscribe());

        let existing = registry.get_or_create("existing", None);
        let reloaded = parse_config("[defaults.circuit_breaker]\nfailure_threshold = 9\n").unwrap();
        tx.send(reloaded).unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while registry.config_for("fresh").circuit_breaker.failure_threshold != 9 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reload was not applied");
        assert_eq!(existing.config().circuit_breaker.failure_threshold, 5);
        assert_eq!(
            registry.get_or_create("fresh", None).config().circuit_breaker.failure_threshold,
            9
        );

        shutdown.trigger();
        task.await.unwrap();
    }

    #[test]
    fn test_build_registry_precreates_services() {
        let config = parse_config(
            r#"
            [services.llm-inference.circuit_breaker]
            failure_threshold = 3
            [services.vector-search.bulkhead]
            tier = "optional"
            "#,
        )
        .unwrap();

        let registry = build_registry(&config);
        assert_eq!(
            registry.names(),
            vec!["llm-inference".to_string(), "vector-search".to_string()]
        );
        let llm = registry.get("llm-inference").unwrap();
        assert_eq!(llm.config().circuit_breaker.failure_threshold, 3);
    }
}
