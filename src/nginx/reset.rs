//! Best-effort eviction of established backend connections.

use std::sync::Arc;

use crate::config::FirewallConfig;
use crate::error::ControlError;
use crate::external::commands::quote;
use crate::external::{Chain, CommandRunner, FirewallRule, RuleEngine, Target};
use crate::model::{Backend, StreamProtocol};
use crate::observability::metrics;

pub struct ConnectionReset {
    rules: Arc<dyn RuleEngine>,
    runner: Arc<dyn CommandRunner>,
    conntrack: String,
}

impl ConnectionReset {
    pub fn new(rules: Arc<dyn RuleEngine>, runner: Arc<dyn CommandRunner>, config: &FirewallConfig) -> Self {
        Self {
            rules,
            runner,
            conntrack: config.conntrack.clone(),
        }
    }

    /// Transient reject rule for traffic to the backend's node.
    pub fn rule(backend: &Backend, protocol: StreamProtocol) -> FirewallRule {
        let reject_with = match protocol {
            StreamProtocol::Tcp => "tcp-reset",
            StreamProtocol::Udp => "icmp-port-unreachable",
        };
        FirewallRule {
            chain: Chain::Output,
            out_interface: backend.node.wg_interface.clone(),
            destination: backend.node.address.clone(),
            protocol: protocol.as_str().to_string(),
            dport: backend.port,
            target: Target::Reject,
            args: vec![("--reject-with".to_string(), reject_with.to_string())],
        }
    }

    /// Reset connections to `backend`. Every step runs even when an earlier
    /// one failed; failures are logged, never returned. The reject rule is
    /// only deleted once it was added.
    pub async fn reset(&self, backend: &Backend, protocol: StreamProtocol) {
        let rule = Self::rule(backend, protocol);
        let mut clean = true;

        match self.rules.add(&rule).await {
            Ok(()) => {
                if let Err(e) = self.rules.delete(&rule).await {
                    clean = false;
                    warn_step(backend, "delete reject rule", &e);
                }
            }
            Err(e) => {
                clean = false;
                warn_step(backend, "add reject rule", &e);
            }
        }

        let flush = format!(
            "{} -D -p {protocol} --dst {} --dport {}",
            self.conntrack,
            quote(&backend.node.address),
            backend.port
        );
        if let Err(e) = self.runner.run(&flush).await {
            clean = false;
            warn_step(backend, "flush conntrack entries", &e);
        }

        metrics::record_connection_reset(clean);
        if clean {
            tracing::debug!(address = %backend.node.address, port = backend.port, "Backend connections reset");
        }
    }
}

fn warn_step(backend: &Backend, step: &str, error: &ControlError) {
    tracing::warn!(
        address = %backend.node.address,
        port = backend.port,
        step,
        error = %error,
        "Unable to reset active backend connections"
    );
}
