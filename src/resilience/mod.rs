//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call site:
//!     registry.get_or_create(service)
//!     → manager.rs (one breaker + one bulkhead per service)
//!     → bulkhead.rs (admit now / queue / reject)
//!     → circuit_breaker.rs (fast-fail when open, track outcomes)
//!     → timeouts.rs (enforce per-call deadline)
//!     → dependency
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every breaker-protected call has a deadline
//! - No retries: every failure surfaces to the caller as a typed error
//! - Circuit breaker prevents cascading failures
//! - Bulkhead keeps one slow dependency from exhausting shared capacity

pub mod bulkhead;
pub mod circuit_breaker;
pub mod error;
pub mod manager;
pub mod registry;
pub mod timeouts;

pub use bulkhead::{Bulkhead, BulkheadStats, Tier};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use error::{
    BulkheadRejectedError, CircuitOpenError, RejectReason, ResilienceError, TimeoutError,
};
pub use manager::{ManagerStats, ResilienceManager};
pub use registry::Registry;
pub use timeouts::Deadline;
