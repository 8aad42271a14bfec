//! Registry identity, bulk operations and teardown.

use std::sync::Arc;
use std::time::Duration;

use resilience_guard::config::RegistryConfig;
use resilience_guard::resilience::{CircuitState, Registry, RejectReason, ResilienceError};

mod common;
use common::{breaker_config, bulkhead_config, manager_config, DependencyError};

#[tokio::test]
async fn test_stats_cover_enabled_components() {
    let registry = Registry::default();
    let manager = registry.get_or_create(
        "llm-inference",
        Some(manager_config(breaker_config(3, 60_000, 1_000, 500), bulkhead_config(2, 2))),
    );
    manager
        .execute(|| async { Ok::<_, DependencyError>(()) })
        .await
        .unwrap();

    let stats = registry.all_stats();
    let entry = &stats["llm-inference"];
    let breaker = entry.circuit_breaker.as_ref().unwrap();
    assert_eq!(breaker.state, CircuitState::Closed);
    assert_eq!(breaker.successes, 1);
    let bulkhead = entry.bulkhead.as_ref().unwrap();
    assert_eq!(bulkhead.max_concurrent, 2);
    assert_eq!(bulkhead.current_concurrent, 0);

    let mut no_bulkhead = manager_config(breaker_config(3, 60_000, 1_000, 500), bulkhead_config(2, 2));
    no_bulkhead.enable_bulkhead = false;
    let bare = registry.get_or_create("vector-search", Some(no_bulkhead));
    let stats = bare.stats();
    assert!(stats.circuit_breaker.is_some());
    assert!(stats.bulkhead.is_none());
}

#[test]
fn test_names_are_distinct_instances() {
    let registry = Registry::default();
    let svc = registry.get_or_create("svc", None);
    let again = registry.get_or_create("svc", None);
    let a = registry.get_or_create("svc-a", None);
    let b = registry.get_or_create("svc-b", None);

    assert!(Arc::ptr_eq(&svc, &again));
    assert!(!Arc::ptr_eq(&svc, &a));
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(registry.len(), 3);
    assert!(Arc::ptr_eq(&registry.get("svc-a").unwrap(), &a));
    assert!(registry.get("missing").is_none());
}

#[test]
fn test_per_service_config_resolution() {
    let mut config = RegistryConfig::default();
    let mut database = config.defaults.clone();
    database.circuit_breaker.failure_threshold = 2;
    config.services.insert("database".to_string(), database);

    let registry = Registry::new(config);
    let db = registry.get_or_create("database", None);
    let other = registry.get_or_create("cache", None);
    assert_eq!(db.config().circuit_breaker.failure_threshold, 2);
    assert_eq!(other.config().circuit_breaker.failure_threshold, 5);
}

#[tokio::test]
async fn test_code_supplied_zero_limits_still_serve_calls() {
    let registry = Registry::default();
    let manager = registry.get_or_create(
        "embeddings",
        Some(manager_config(breaker_config(0, 60_000, 1_000, 500), bulkhead_config(0, 1))),
    );

    let value = tokio::time::timeout(
        Duration::from_millis(300),
        manager.execute(|| async { Ok::<_, DependencyError>("ok") }),
    )
    .await
    .expect("call must not wait forever for a slot")
    .unwrap();
    assert_eq!(value, "ok");

    let stats = manager.stats();
    assert_eq!(stats.bulkhead.unwrap().max_concurrent, 1);
    assert_eq!(manager.config().circuit_breaker.failure_threshold, 1);
}

#[tokio::test]
async fn test_reset_all_closes_open_circuits() {
    let registry = Registry::default();
    let mut cfg = manager_config(breaker_config(1, 60_000, 30_000, 500), bulkhead_config(2, 2));
    cfg.enable_bulkhead = false;
    let flaky = registry.get_or_create("flaky", Some(cfg));
    registry.get_or_create("steady", None);

    let _ = flaky
        .execute(|| async { Err::<(), _>(DependencyError("down")) })
        .await;
    assert_eq!(registry.open_circuits(), vec!["flaky".to_string()]);

    registry.reset_all();
    assert!(registry.open_circuits().is_empty());
    assert_eq!(flaky.circuit_state(), Some(CircuitState::Closed));
    assert_eq!(registry.len(), 2, "reset keeps entries");

    let value = flaky
        .execute(|| async { Ok::<_, DependencyError>(7) })
        .await
        .unwrap();
    assert_eq!(value, 7);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_all_drains_in_flight_work() {
    let registry = Arc::new(Registry::default().with_drain_timeout(Duration::from_secs(5)));
    let manager = registry.get_or_create(
        "llm-inference",
        Some(manager_config(breaker_config(3, 60_000, 1_000, 2_000), bulkhead_config(1, 2))),
    );

    let calls: Vec<_> = (0..3)
        .map(|i| {
            let m = manager.clone();
            tokio::spawn(async move { m.execute(move || common::slow_ok(100, i)).await })
        })
        .collect();
    tokio::task::yield_now().await;

    registry.destroy_all().await;
    assert!(registry.is_empty());
    for call in calls {
        assert!(call.await.unwrap().is_ok());
    }
    assert_eq!(manager.stats().bulkhead.unwrap().total_executed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_all_rejects_work_past_drain_timeout() {
    let registry = Registry::default().with_drain_timeout(Duration::from_millis(50));
    let manager = registry.get_or_create(
        "optional-enrichment",
        Some(manager_config(breaker_config(3, 60_000, 1_000, 2_000), bulkhead_config(1, 1))),
    );

    let m = manager.clone();
    let running = tokio::spawn(async move { m.execute(|| common::slow_ok(500, "slow")).await });
    tokio::task::yield_now().await;
    let queued = manager.execute(|| common::slow_ok(10, "never"));

    registry.destroy_all().await;
    match queued.await {
        Err(ResilienceError::BulkheadRejected(err)) => {
            assert_eq!(err.reason, RejectReason::Shutdown)
        }
        other => panic!("expected shutdown rejection, got {other:?}"),
    }
    assert_eq!(running.await.unwrap().unwrap(), "slow");
}
