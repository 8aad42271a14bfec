//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, durations > 0, capacity >= 1)
//! - Check addresses parse and the admin key is not the placeholder
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{
    GuardConfig, ResilienceConfig, MIN_CONCURRENCY, MIN_DURATION_MS, MIN_FAILURE_THRESHOLD,
};

const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_resilience("defaults", &config.defaults, &mut errors);

    for (name, service) in &config.services {
        if name.trim().is_empty() {
            errors.push(ValidationError::new("services", "service name must not be empty"));
        }
        validate_resilience(&format!("services.{name}"), service, &mut errors);
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("invalid socket address '{}'", config.admin.bind_address),
            ));
        }
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set to a non-placeholder value when admin is enabled",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_resilience(prefix: &str, config: &ResilienceConfig, errors: &mut Vec<ValidationError>) {
    let cb = &config.circuit_breaker;
    if cb.failure_threshold < MIN_FAILURE_THRESHOLD {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.failure_threshold"),
            "must be at least 1",
        ));
    }
    for (field, value) in [
        ("window_ms", cb.window_ms),
        ("reset_timeout_ms", cb.reset_timeout_ms),
        ("timeout_ms", cb.timeout_ms),
    ] {
        if value < MIN_DURATION_MS {
            errors.push(ValidationError::new(
                format!("{prefix}.circuit_breaker.{field}"),
                "must be greater than 0",
            ));
        }
    }

    if config
        .bulkhead
        .max_concurrent
        .is_some_and(|limit| limit < MIN_CONCURRENCY)
    {
        errors.push(ValidationError::new(
            format!("{prefix}.bulkhead.max_concurrent"),
            "must be at least 1",
        ));
    }
}
