//! Hot reload of form limits from the configuration file.
//!
//! Only the `[form]` section can change while the server runs. Edits to any
//! other section are reported and left for the next restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::Form2JsonConfig;

/// What a freshly loaded file means for the running server.
#[derive(Debug, PartialEq, Eq)]
pub struct ReloadPlan {
    /// The form limits differ and should be swapped in.
    pub form_changed: bool,
    /// Sections that differ but only take effect after a restart.
    pub needs_restart: Vec<&'static str>,
}

/// Compare the configuration in effect with one read from disk.
pub fn plan_reload(applied: &Form2JsonConfig, loaded: &Form2JsonConfig) -> ReloadPlan {
    let mut needs_restart = Vec::new();
    if applied.listener != loaded.listener {
        needs_restart.push("listener");
    }
    if applied.upstream != loaded.upstream {
        needs_restart.push("upstream");
    }
    if applied.timeouts != loaded.timeouts {
        needs_restart.push("timeouts");
    }
    if applied.observability != loaded.observability {
        needs_restart.push("observability");
    }

    ReloadPlan {
        form_changed: applied.form != loaded.form,
        needs_restart,
    }
}

/// Watches the configuration file and forwards changed form limits.
pub struct ConfigWatcher {
    path: PathBuf,
    applied: Form2JsonConfig,
    update_tx: mpsc::UnboundedSender<Form2JsonConfig>,
}

impl ConfigWatcher {
    /// `applied` is the configuration the server was started with.
    pub fn new(
        path: &Path,
        applied: Form2JsonConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Form2JsonConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            applied,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Reload the file and forward it if the form limits changed.
    ///
    /// Returns whether an update was sent.
    fn reload(&mut self) -> bool {
        let loaded = match load_config(&self.path) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Rejected config change, keeping current limits");
                return false;
            }
        };

        let plan = plan_reload(&self.applied, &loaded);
        if !plan.needs_restart.is_empty() {
            tracing::warn!(
                sections = ?plan.needs_restart,
                "Config sections changed on disk; they apply after a restart"
            );
        }
        if !plan.form_changed {
            tracing::debug!(path = ?self.path, "Form limits unchanged");
            return false;
        }

        // the other sections stay as the server is actually running them
        self.applied.form = loaded.form.clone();
        self.update_tx.send(loaded).is_ok()
    }

    /// Start watching in a background thread.
    ///
    /// Updates flow for as long as the returned watcher is alive.
    pub fn run(mut self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    self.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Watching config for form limit changes");
        Ok(watcher)
    }
}
