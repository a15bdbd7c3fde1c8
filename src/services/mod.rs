//! Orchestrators turning records into live proxy configuration.
//!
//! # Data Flow
//! ```text
//! DomainLifecycle ──▶ certificate ──▶ sidecar ──▶ vhost + default location ──┐
//!       ▲                                                                     │
//!       │ ensure_exists (no reload)                                           ▼
//! HttpServiceManager ──▶ location fragment ──────────────────────▶ ProxyControl::check_config
//! TcpServiceManager  ──▶ reachability ──▶ stream file ───────────▶   (test, reload | quarantine)
//!
//! removals ──▶ ConnectionReset (best effort)
//! ```
//!
//! # Design Decisions
//! - Each orchestrator owns disjoint files; nothing is locked
//! - Services depend on the domain lifecycle, never the other way round
//! - External failures abort only the resource being built, before it writes

pub mod domains;
pub mod http;
pub mod tcp;

pub use domains::DomainLifecycle;
pub use http::HttpServiceManager;
pub use tcp::TcpServiceManager;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::ControlConfig;
use crate::error::ControlResult;
use crate::external::{
    AuthSidecarManager, CertificateProvider, CommandRunner, IptablesRuleEngine, OpensslCertbotProvider,
    ReachabilityProbe, RuleEngine, ShellRunner, SupervisorSidecarManager, TcpProbe,
};
use crate::nginx::{Activation, ConfLayout, ConnectionReset, ProxyControl};
use crate::store::{DomainStore, HttpServiceStore, MemoryStore, NodeStore, TcpServiceStore};

/// Result of a create or update: the stored record and how its file fared.
#[derive(Debug, Clone, Serialize)]
pub struct Applied<T> {
    pub record: T,
    pub activation: Activation,
}

/// Per-resource result of a bulk rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<Activation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub(crate) fn from_result(resource: String, result: ControlResult<Activation>) -> Self {
        match result {
            Ok(activation) => Self {
                resource,
                activation: Some(activation),
                error: None,
            },
            Err(e) => {
                tracing::error!(resource = %resource, error = %e, "Build failed");
                Self {
                    resource,
                    activation: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn is_quarantined(&self) -> bool {
        self.activation.as_ref().is_some_and(Activation::is_quarantined)
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Host capabilities the orchestrators call out to.
#[derive(Clone)]
pub struct Adapters {
    pub runner: Arc<dyn CommandRunner>,
    pub certificates: Arc<dyn CertificateProvider>,
    pub sidecars: Arc<dyn AuthSidecarManager>,
    pub rules: Arc<dyn RuleEngine>,
    pub probe: Arc<dyn ReachabilityProbe>,
}

impl Adapters {
    /// Shell-backed adapters for a real appliance.
    pub fn system(config: &ControlConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner);
        let appliance = &config.appliance;
        let public_address = appliance
            .public_address
            .as_deref()
            .and_then(|a| a.parse::<IpAddr>().ok());

        Self {
            certificates: Arc::new(OpensslCertbotProvider::new(
                runner.clone(),
                appliance.self_signed_dir.clone(),
                appliance.certbot_live_dir.clone(),
                appliance.certbot_email.clone(),
            )),
            sidecars: Arc::new(SupervisorSidecarManager::new(runner.clone(), config.sidecar.clone())),
            rules: Arc::new(IptablesRuleEngine::new(runner.clone(), config.firewall.iptables.clone())),
            probe: Arc::new(TcpProbe::new(
                runner.clone(),
                public_address,
                Duration::from_millis(appliance.probe_timeout_ms),
            )),
            runner,
        }
    }
}

/// Record stores the orchestrators read and write.
#[derive(Clone)]
pub struct Stores {
    pub domains: Arc<dyn DomainStore>,
    pub nodes: Arc<dyn NodeStore>,
    pub http_services: Arc<dyn HttpServiceStore>,
    pub tcp_services: Arc<dyn TcpServiceStore>,
}

impl Stores {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            domains: store.clone(),
            nodes: store.clone(),
            http_services: store.clone(),
            tcp_services: store,
        }
    }
}

/// All orchestrators wired to one set of stores and adapters.
pub struct Engine {
    pub domains: Arc<DomainLifecycle>,
    pub http: HttpServiceManager,
    pub tcp: TcpServiceManager,
    control: Arc<ProxyControl>,
    layout: Arc<ConfLayout>,
}

impl Engine {
    pub fn new(config: &ControlConfig, stores: Stores, adapters: Adapters) -> Self {
        let layout = Arc::new(ConfLayout::new(config.paths.clone()));
        let control = Arc::new(ProxyControl::new(adapters.runner.clone(), &config.nginx));
        let reset = Arc::new(ConnectionReset::new(
            adapters.rules.clone(),
            adapters.runner.clone(),
            &config.firewall,
        ));

        let domains = Arc::new(DomainLifecycle::new(
            stores.domains.clone(),
            adapters.certificates.clone(),
            adapters.sidecars.clone(),
            adapters.probe.clone(),
            control.clone(),
            layout.clone(),
        ));

        let http = HttpServiceManager::new(
            stores.http_services.clone(),
            stores.nodes.clone(),
            domains.clone(),
            control.clone(),
            layout.clone(),
            reset.clone(),
        );

        let tcp = TcpServiceManager::new(
            stores.tcp_services.clone(),
            stores.nodes.clone(),
            domains.clone(),
            adapters.certificates.clone(),
            adapters.probe.clone(),
            control.clone(),
            layout.clone(),
            reset,
        );

        Self {
            domains,
            http,
            tcp,
            control,
            layout,
        }
    }

    pub fn control(&self) -> &ProxyControl {
        &self.control
    }

    pub fn layout(&self) -> &ConfLayout {
        &self.layout
    }
}
