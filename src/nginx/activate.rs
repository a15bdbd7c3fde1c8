//! Test-then-activate protocol for freshly written files.
//!
//! ```text
//! Written ──test──▶ pass ──restart──▶ Activated
//!                     │    └─no restart─▶ Deferred
//!                     └─ fail ─rename *.err─▶ Quarantined
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::NginxConfig;
use crate::error::ControlResult;
use crate::external::CommandRunner;
use crate::nginx::files;
use crate::nginx::layout::quarantine_path;
use crate::observability::metrics;

/// Outcome of building one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Activation {
    /// Test passed and the proxy was reloaded.
    Activated,
    /// Test passed; the reload is left to the caller.
    Deferred,
    /// Test failed; the file was moved aside.
    Quarantined { path: PathBuf },
    /// Nothing rendered (disabled resource).
    Skipped,
}

impl Activation {
    pub fn is_quarantined(&self) -> bool {
        matches!(self, Self::Quarantined { .. })
    }
}

/// Proxy test and reload commands.
pub struct ProxyControl {
    runner: Arc<dyn CommandRunner>,
    test_command: String,
    reload_command: String,
}

impl ProxyControl {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &NginxConfig) -> Self {
        Self {
            runner,
            test_command: config.test_command.clone(),
            reload_command: config.reload_command.clone(),
        }
    }

    /// Test the whole configuration tree.
    pub async fn test(&self) -> bool {
        let passed = match self.runner.run(&self.test_command).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "Proxy configuration test failed");
                false
            }
        };
        metrics::record_config_test(passed);
        passed
    }

    /// Graceful reload.
    pub async fn reload(&self) -> ControlResult<()> {
        self.runner.run(&self.reload_command).await?;
        metrics::record_reload();
        tracing::info!("Proxy reloaded");
        Ok(())
    }

    /// Validate `file`, which has just been written, against the full tree.
    ///
    /// A failing file is quarantined and reported, never returned as an
    /// error, so sibling resources keep building.
    pub async fn check_config(&self, file: &Path, restart: bool) -> ControlResult<Activation> {
        let stale = quarantine_path(file);

        if !self.test().await {
            files::rename(file, &stale).await?;
            tracing::error!(file = %file.display(), quarantined = %stale.display(), "Configuration file quarantined");
            return Ok(Activation::Quarantined { path: stale });
        }

        if files::remove_file(&stale).await? {
            tracing::info!(file = %stale.display(), "Cleared stale quarantine file");
        }

        if restart {
            self.reload().await?;
            Ok(Activation::Activated)
        } else {
            Ok(Activation::Deferred)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        fail_test: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for Scripted {
        async fn run(&self, command: &str) -> ControlResult<String> {
            self.calls.lock().unwrap().push(command.to_string());
            if self.fail_test && command == "nginx -t" {
                return Err(ControlError::Command {
                    command: command.to_string(),
                    output: "emerg".to_string(),
                });
            }
            Ok(String::new())
        }
    }

    fn control(fail_test: bool) -> (ProxyControl, Arc<Scripted>) {
        let runner = Arc::new(Scripted {
            fail_test,
            calls: Mutex::new(Vec::new()),
        });
        (ProxyControl::new(runner.clone(), &NginxConfig::default()), runner)
    }

    #[tokio::test]
    async fn test_pass_with_restart_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.conf");
        std::fs::write(&file, "").unwrap();

        let (control, runner) = control(false);
        assert_eq!(control.check_config(&file, true).await.unwrap(), Activation::Activated);
        assert_eq!(*runner.calls.lock().unwrap(), vec!["nginx -t", "nginx -s reload"]);
    }

    #[tokio::test]
    async fn test_pass_without_restart_defers() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.conf");
        std::fs::write(&file, "").unwrap();
        std::fs::write(dir.path().join("a.conf.err"), "old").unwrap();

        let (control, runner) = control(false);
        assert_eq!(control.check_config(&file, false).await.unwrap(), Activation::Deferred);
        assert_eq!(*runner.calls.lock().unwrap(), vec!["nginx -t"]);
        assert!(!dir.path().join("a.conf.err").exists());
    }

    #[tokio::test]
    async fn test_failure_quarantines_without_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.conf");
        std::fs::write(&file, "broken").unwrap();

        let (control, runner) = control(true);
        let outcome = control.check_config(&file, true).await.unwrap();

        assert!(outcome.is_quarantined());
        assert!(!file.exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.conf.err")).unwrap(), "broken");
        assert_eq!(*runner.calls.lock().unwrap(), vec!["nginx -t"]);
    }
}
