//! Fault isolation for calls to slow or unreliable dependencies.
//!
//! Each named dependency gets a [`ResilienceManager`] combining a bulkhead
//! (bounded concurrency + FIFO queue) and a circuit breaker (fail fast after
//! repeated failures, per-call deadline). Managers live in a [`Registry`]
//! created at startup and shared by `Arc`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use resilience_guard::{Registry, ResilienceError};
//!
//! # async fn example() {
//! let registry = Arc::new(Registry::default());
//! let search = registry.get_or_create("vector-search", None);
//!
//! let result: Result<Vec<u32>, ResilienceError<std::io::Error>> =
//!     search.execute(|| async { Ok(vec![1, 2, 3]) }).await;
//! # let _ = result;
//! # }
//! ```

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GuardConfig;
pub use resilience::{Registry, ResilienceError, ResilienceManager};
