//! Configuration file watcher for hot reload.
//!
//! # Reload Rules
//! - Only modify/create events trigger a reload
//! - Identical file contents are not re-sent (editors often emit several
//!   events per save)
//! - A file that fails to parse or validate is logged and skipped; whatever
//!   configuration is in use stays in use

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::GuardConfig;

/// What a single reload attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new validated configuration was sent.
    Applied,
    /// File contents match the last seen version.
    Unchanged,
    /// File could not be read, parsed or validated.
    Rejected,
}

/// Watches the configuration file and sends validated updates.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GuardConfig>,
    last_seen: Arc<Mutex<Option<String>>>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for validated updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GuardConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
            last_seen: Arc::new(Mutex::new(None)),
        };
        (watcher, update_rx)
    }

    /// Re-read the file once and send it if it is new and valid.
    pub fn reload(&self) -> ReloadOutcome {
        reload_file(&self.path, &self.last_seen, &self.update_tx)
    }

    /// Start watching. The returned handle must be kept alive for as long as
    /// watching should continue.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        // The file as loaded at startup is the baseline, not an update.
        if let Ok(current) = fs::read_to_string(&self.path) {
            *self.last_seen.lock() = Some(current);
        }

        let path = self.path.clone();
        let last_seen = Arc::clone(&self.last_seen);
        let tx = self.update_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                    reload_file(&path, &last_seen, &tx);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn reload_file(
    path: &Path,
    last_seen: &Mutex<Option<String>>,
    tx: &mpsc::UnboundedSender<GuardConfig>,
) -> ReloadOutcome {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Config file unreadable, keeping current configuration");
            return ReloadOutcome::Rejected;
        }
    };

    let mut last = last_seen.lock();
    if last.as_deref() == Some(contents.as_str()) {
        return ReloadOutcome::Unchanged;
    }

    let parsed = parse_config(&contents);
    *last = Some(contents);
    drop(last);

    match parsed {
        Ok(config) => {
            tracing::info!(path = %path.display(), services = config.services.len(), "Config reloaded");
            let _ = tx.send(config);
            ReloadOutcome::Applied
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Invalid config, keeping current configuration");
            ReloadOutcome::Rejected
        }
    }
}
