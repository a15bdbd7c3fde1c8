//! Inventory file watcher for hot re-synchronization.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::inventory::Inventory;
use crate::config::loader::load_inventory;

/// Watches the inventory file and forwards every successfully parsed version.
pub struct InventoryWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Inventory>,
}

impl InventoryWatcher {
    /// Returns the watcher and a receiver for inventory updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Inventory>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %path.display(), "Inventory change detected");
                        match load_inventory(&path) {
                            Ok(inventory) => {
                                let _ = tx.send(inventory);
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to reload inventory; keeping current records");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Inventory watcher started");
        Ok(watcher)
    }
}
