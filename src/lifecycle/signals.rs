//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM/SIGINT trigger shutdown
//! - SIGHUP requests a re-sync, not shutdown

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::lifecycle::shutdown::Shutdown;

/// Spawn the signal task. The receiver yields one item per SIGHUP.
pub fn listen(shutdown: Arc<Shutdown>) -> std::io::Result<mpsc::UnboundedReceiver<()>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received, re-synchronizing");
                    if tx.send(()).is_err() {
                        break;
                    }
                }
                _ = terminate.recv() => {
                    tracing::info!("SIGTERM received, shutting down");
                    shutdown.trigger();
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received, shutting down");
                    shutdown.trigger();
                    break;
                }
            }
        }
    });

    Ok(rx)
}
