//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build registry → Start metrics/watcher/admin
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Notify tasks → Drain bulkheads → Clear leftovers → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then registry, then background tasks
//! - Ordered shutdown: stop admin, drain in-flight work, clear queues
//! - Draining has a deadline: queued calls are rejected once it passes

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
