//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GateConfig;

/// Watches the gate's config file and forwards every config that loads and
/// validates. A file that fails either step is logged and skipped, so the
/// running config stays in place.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<GateConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for reloaded configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, updates } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                    if let Some(config) = reload(&watched) {
                        let _ = updates.send(config);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path) -> Option<GateConfig> {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = ?path, "Config file changed, reloaded");
            Some(config)
        }
        Err(e) => {
            tracing::error!(
                path = ?path,
                error = %e,
                "Config reload rejected, keeping current config"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reload_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[budget]\nperiod_secs = 0").unwrap();
        assert!(reload(file.path()).is_none());
    }

    #[test]
    fn test_reload_accepts_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[budget]\ndefault_limit = 75.0").unwrap();
        let config = reload(file.path()).unwrap();
        assert_eq!(config.budget.default_limit, 75.0);
    }
}
