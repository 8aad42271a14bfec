use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::health::HealthReport;
use crate::resilience::manager::ManagerStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub services: usize,
}

#[derive(Serialize)]
pub struct ResetSummary {
    pub reset: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        services: state.registry.len(),
    })
}

/// 200 when every circuit is closed or half-open, 503 when any is open.
pub async fn get_health(State(state): State<AdminState>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::from_registry(&state.registry);
    let code = if report.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<BTreeMap<String, ManagerStats>> {
    Json(state.registry.all_stats())
}

pub async fn post_reset(State(state): State<AdminState>) -> Json<ResetSummary> {
    state.registry.reset_all();
    Json(ResetSummary {
        reset: state.registry.len(),
    })
}
