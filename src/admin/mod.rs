//! Admin API.
//!
//! # Endpoints
//! - `GET  /admin/status`: version and number of managed services
//! - `GET  /admin/health`: health report (503 when any circuit is open)
//! - `GET  /admin/stats`: per-service breaker and bulkhead stats
//! - `POST /admin/reset`: close all breakers and drop queued calls
//!
//! All endpoints require `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::AdminConfig;
use crate::resilience::registry::Registry;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<Registry>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(registry: Arc<Registry>, api_key: &str) -> Self {
        Self {
            registry,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/health", get(get_health))
        .route("/admin/stats", get(get_stats))
        .route("/admin/reset", post(post_reset))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the admin listener. Called before startup completes so a taken
/// address is a startup error.
pub async fn bind_admin(config: &AdminConfig) -> Result<TcpListener, std::io::Error> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    Ok(listener)
}

/// Serve the admin API on `listener` until the shutdown signal fires.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let router = setup_admin_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
