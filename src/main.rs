//! resilience-guard daemon.
//!
//! Loads the guard configuration, pre-creates the configured services and
//! exposes their health and stats over the admin API until SIGINT/SIGTERM.
//!
//! ```text
//!   config.toml ──▶ loader ──▶ Registry ──▶ admin API (/admin/health, /admin/stats)
//!        │                        ▲
//!        └── watcher (reload) ────┘            metrics ──▶ Prometheus scrape
//! ```

use std::path::PathBuf;

use clap::Parser;

use resilience_guard::config::{load_config, GuardConfig};
use resilience_guard::lifecycle::startup::{build_registry, run_until_shutdown};
use resilience_guard::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "resilience-guard")]
#[command(about = "Circuit breaker and bulkhead registry with an admin API", long_about = None)]
struct Args {
    /// Path to the TOML configuration file (defaults are used when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(long, default_value_t = false)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!("resilience-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        services = config.services.len(),
        admin_enabled = config.admin.enabled,
        metrics_enabled = config.observability.metrics_enabled,
        drain_timeout_ms = config.lifecycle.drain_timeout_ms,
        "Configuration loaded"
    );

    let registry = build_registry(&config);
    let watch_path = if args.watch { args.config.clone() } else { None };

    run_until_shutdown(config, registry, watch_path).await?;
    Ok(())
}
