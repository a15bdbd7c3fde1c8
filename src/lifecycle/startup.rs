//! Startup re-synchronization.
//!
//! # Design Decisions
//! - Domains build before services so implicit domains are never needed
//!   for records that exist
//! - Every resource builds with `restart = false`; auth sidecars are
//!   applied in one update, then one reload follows
//! - A failing resource is reported, never fatal to the sync

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::Inventory;
use crate::error::ControlResult;
use crate::nginx::quarantine;
use crate::services::{Engine, Outcome};

/// Everything a bulk sync did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub domains: Vec<Outcome>,
    pub http_services: Vec<Outcome>,
    pub tcp_services: Vec<Outcome>,
    /// Resources torn down because they left the inventory.
    pub pruned: Vec<String>,
    /// Whether deferred auth sidecar programs were applied.
    pub sidecars_applied: bool,
    pub reloaded: bool,
    /// Quarantined files outstanding after the sync.
    pub quarantined: Vec<PathBuf>,
}

impl SyncReport {
    fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.domains
            .iter()
            .chain(&self.http_services)
            .chain(&self.tcp_services)
    }

    pub fn failed(&self) -> usize {
        self.outcomes().filter(|o| o.is_failed()).count()
    }

    pub fn newly_quarantined(&self) -> usize {
        self.outcomes().filter(|o| o.is_quarantined()).count()
    }
}

/// Rebuild every record, then reload once.
pub async fn resync(engine: &Engine) -> ControlResult<SyncReport> {
    tracing::info!("Re-synchronizing proxy configuration");

    let mut report = SyncReport {
        domains: engine.domains.initialize().await?,
        http_services: engine.http.initialize().await?,
        tcp_services: engine.tcp.initialize().await?,
        ..SyncReport::default()
    };

    match engine.domains.apply_sidecars().await {
        Ok(applied) => report.sidecars_applied = applied,
        Err(e) => tracing::error!(error = %e, "Failed to apply auth sidecar programs"),
    }

    engine.control().reload().await?;
    report.reloaded = true;

    report.quarantined = quarantine::sweep(engine.layout()).await?.files;

    tracing::info!(
        domains = report.domains.len(),
        http_services = report.http_services.len(),
        tcp_services = report.tcp_services.len(),
        failed = report.failed(),
        quarantined = report.newly_quarantined(),
        "Re-synchronization complete"
    );
    Ok(report)
}

/// Tear down what `engine` currently manages but `next` no longer lists,
/// without reloading. HTTP services whose location moved are removed too,
/// since their old fragment would otherwise linger.
pub async fn prune(engine: &Engine, next: &Inventory) -> ControlResult<Vec<String>> {
    let mut pruned = Vec::new();

    let http: HashSet<(&str, Option<&str>, &str)> = next
        .http_services
        .iter()
        .map(|e| (e.identifier.as_str(), e.service.domain.as_deref(), e.service.path.as_str()))
        .collect();
    for service in engine.http.all().await? {
        let key = (service.identifier.as_str(), service.domain.as_deref(), service.path.as_str());
        if !http.contains(&key) {
            engine.http.remove(&service, false).await?;
            pruned.push(format!("http {}", service.identifier));
        }
    }

    let tcp: HashSet<&str> = next.tcp_services.iter().map(|e| e.identifier.as_str()).collect();
    for service in engine.tcp.all().await? {
        if !tcp.contains(service.identifier.as_str()) {
            engine.tcp.remove(&service, false).await?;
            pruned.push(format!("tcp {}", service.identifier));
        }
    }

    let listed: HashSet<&str> = next.domains.iter().map(|d| d.name.as_str()).collect();
    let referenced: HashSet<&str> = next
        .http_services
        .iter()
        .filter_map(|e| e.service.domain.as_deref())
        .chain(next.tcp_services.iter().filter_map(|e| e.service.domain.as_deref()))
        .collect();
    for domain in engine.domains.all().await? {
        let name = domain.name.as_str();
        if !listed.contains(name) && !referenced.contains(name) {
            engine.domains.teardown(&domain, false).await?;
            pruned.push(format!("domain {name}"));
        }
    }

    if !pruned.is_empty() {
        tracing::info!(count = pruned.len(), "Pruned resources no longer in inventory");
    }
    Ok(pruned)
}
