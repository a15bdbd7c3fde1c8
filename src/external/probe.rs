//! Backend reachability and DNS ownership probes.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::external::commands::{quote, CommandRunner};
use crate::model::access::is_ip_literal;

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Whether `host:port` accepts a TCP connection. A `resolver` names the
    /// DNS server that must be used for non-literal hosts.
    async fn check_port(&self, host: &str, port: u16, resolver: Option<&str>) -> bool;

    /// Whether `name` currently resolves to this appliance.
    async fn resolves_to_this_host(&self, name: &str) -> bool;
}

/// Connect-with-timeout probe. Names behind a gateway are resolved with `dig`.
pub struct TcpProbe {
    runner: Arc<dyn CommandRunner>,
    public_address: Option<IpAddr>,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, public_address: Option<IpAddr>, timeout: Duration) -> Self {
        Self {
            runner,
            public_address,
            timeout,
        }
    }

    async fn resolve(&self, host: &str, port: u16, resolver: Option<&str>) -> Vec<SocketAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return vec![SocketAddr::new(ip, port)];
        }

        match resolver {
            Some(server) => match self
                .runner
                .run(&format!("dig +short {} {}", quote(&format!("@{server}")), quote(host)))
                .await
            {
                Ok(output) => output
                    .lines()
                    .filter_map(|line| line.trim().parse::<IpAddr>().ok())
                    .map(|ip| SocketAddr::new(ip, port))
                    .collect(),
                Err(e) => {
                    tracing::debug!(host, server, error = %e, "Resolver lookup failed");
                    Vec::new()
                }
            },
            None => match tokio::net::lookup_host((host, port)).await {
                Ok(addrs) => addrs.collect(),
                Err(e) => {
                    tracing::debug!(host, error = %e, "DNS lookup failed");
                    Vec::new()
                }
            },
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn check_port(&self, host: &str, port: u16, resolver: Option<&str>) -> bool {
        let resolver = resolver.filter(|_| !is_ip_literal(host));
        for addr in self.resolve(host, port, resolver).await {
            match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_)) => return true,
                Ok(Err(e)) => tracing::debug!(%addr, error = %e, "Backend refused connection"),
                Err(_) => tracing::debug!(%addr, "Backend probe timed out"),
            }
        }
        false
    }

    async fn resolves_to_this_host(&self, name: &str) -> bool {
        let Some(public) = self.public_address else {
            return false;
        };

        match tokio::net::lookup_host((name, 0)).await {
            Ok(mut addrs) => addrs.any(|addr| addr.ip() == public),
            Err(e) => {
                tracing::debug!(name, error = %e, "DNS lookup failed");
                false
            }
        }
    }
}
