//! Hot reload of breaker profiles.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a new file and renaming it over the old one are
//! still picked up.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::GuardConfig;
use crate::resilience::BreakerRegistry;

/// Emits a validated [`GuardConfig`] each time the file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<GuardConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GuardConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. Updates flow for as long as the returned handle lives.
    ///
    /// Invalid files are logged and skipped; the last good config stays.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watch_dir(&self.path).to_path_buf();
        let file_name: Option<OsString> = self.path.file_name().map(OsString::from);
        let path = self.path;
        let updates = self.updates;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                let touches_config = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(OsString::from) == file_name);
                if !touches_config {
                    return;
                }

                match load_config(&path) {
                    Ok(config) => {
                        tracing::info!(
                            path = %path.display(),
                            profiles = config.breakers.len(),
                            "Config reloaded"
                        );
                        let _ = updates.send(config);
                    }
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring invalid config, keeping previous profiles"
                    ),
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %dir.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Push every reloaded config's breaker profiles into `registry`.
///
/// Ends when the sending side is dropped.
pub fn spawn_profile_reloader(
    registry: Arc<BreakerRegistry>,
    mut updates: mpsc::UnboundedReceiver<GuardConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            registry.apply_profiles(config.breakers);
        }
        tracing::debug!("Config update channel closed");
    })
}

/// Watch `path` and keep `registry`'s profiles in sync with it.
///
/// Dropping the returned watcher stops reloads and ends the task.
pub fn start_hot_reload(
    path: &Path,
    registry: Arc<BreakerRegistry>,
) -> Result<(RecommendedWatcher, JoinHandle<()>), notify::Error> {
    let (watcher, updates) = ConfigWatcher::new(path);
    let handle = watcher.run()?;
    let reloader = spawn_profile_reloader(registry, updates);
    Ok((handle, reloader))
}
