//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → RegistryConfig handed to the registry
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → registry swaps its config table
//!     → only managers created afterwards observe the new values
//! ```
//!
//! # Design Decisions
//! - A manager's configuration is fixed by the first call that creates it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BulkheadConfig, CircuitBreakerConfig, GuardConfig, LifecycleConfig,
    ObservabilityConfig, RegistryConfig, ResilienceConfig,
};
