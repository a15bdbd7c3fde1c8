//! TCP/UDP stream services: one stream file per service.

use std::sync::Arc;

use crate::conf::{ServerConf, StreamConf};
use crate::error::{ControlError, ControlResult};
use crate::external::{CertificateProvider, ReachabilityProbe};
use crate::model::{Backend, CertPair, Domain, Identifier, Node, StreamProtocol, TcpService, TcpServiceRequest, TcpServiceUpdate};
use crate::nginx::{files, Activation, ConfLayout, ConnectionReset, ProxyControl};
use crate::services::{Applied, DomainLifecycle, Outcome};
use crate::store::{NodeStore, TcpServiceStore};

/// Certificate name used for stream services without a domain.
const WILDCARD_CERT: &str = "_";

pub struct TcpServiceManager {
    store: Arc<dyn TcpServiceStore>,
    nodes: Arc<dyn NodeStore>,
    domains: Arc<DomainLifecycle>,
    certificates: Arc<dyn CertificateProvider>,
    probe: Arc<dyn ReachabilityProbe>,
    control: Arc<ProxyControl>,
    layout: Arc<ConfLayout>,
    reset: Arc<ConnectionReset>,
}

impl TcpServiceManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn TcpServiceStore>,
        nodes: Arc<dyn NodeStore>,
        domains: Arc<DomainLifecycle>,
        certificates: Arc<dyn CertificateProvider>,
        probe: Arc<dyn ReachabilityProbe>,
        control: Arc<ProxyControl>,
        layout: Arc<ConfLayout>,
        reset: Arc<ConnectionReset>,
    ) -> Self {
        Self {
            store,
            nodes,
            domains,
            certificates,
            probe,
            control,
            layout,
            reset,
        }
    }

    pub async fn all(&self) -> ControlResult<Vec<TcpService>> {
        self.store.all().await
    }

    pub async fn get(&self, id: u64) -> ControlResult<TcpService> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("tcp service {id}")))
    }

    async fn node(&self, id: u64) -> ControlResult<Node> {
        self.nodes
            .find(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("node {id}")))
    }

    /// Reject a backend that does not accept connections right now.
    pub async fn check_backend(&self, backend: &Backend) -> ControlResult<()> {
        let resolved = backend.resolve();
        if self
            .probe
            .check_port(&resolved.host, resolved.port, resolved.resolver.as_deref())
            .await
        {
            Ok(())
        } else {
            Err(ControlError::validation(
                "backend_port",
                format!("unable to reach port {} on node {}", resolved.port, backend.node.name),
            ))
        }
    }

    /// Stream file text. `tls` is the pair to terminate with, if any.
    pub fn render(&self, service: &TcpService, tls: Option<&CertPair>) -> String {
        let backend = service.backend.resolve();
        let identifier = service.identifier.as_str();

        let mut listen = service.port.to_string();
        if tls.is_some() {
            listen.push_str(" ssl");
        }
        if service.protocol == StreamProtocol::Udp {
            listen.push_str(" udp");
        }

        let mut server = ServerConf::new();
        server.access(&service.access).listen(&listen);

        if let Some(name) = &service.domain {
            server.server_name(name);
        }

        let log = self
            .layout
            .log_file(service.domain.as_deref(), &format!("{identifier}_stream.log"));
        server.access_log(&log, Some("stream_logs"));

        if let Some(resolver) = &backend.resolver {
            server.resolver(resolver);
        }
        if let Some(pair) = tls {
            server.ssl_certificates(pair);
        }
        server.stream_proxy(identifier);

        let mut stream = StreamConf::new();
        stream
            .upstream(identifier, &[format!("{}:{}", backend.host, backend.port)])
            .server(&server);
        stream.render()
    }

    /// Pair for TLS termination: the bound domain's, else a self-signed one
    /// for a TLS domain, else the wildcard self-signed pair. Plain domains
    /// never get a certificate directory of their own.
    async fn tls_pair(&self, service: &TcpService, domain: Option<&Domain>) -> ControlResult<Option<CertPair>> {
        if !service.ssl {
            return Ok(None);
        }
        match domain.filter(|d| d.ssl.requires_tls()) {
            Some(Domain {
                cert_pair: Some(pair), ..
            }) => Ok(Some(pair.clone())),
            Some(domain) => Ok(Some(self.certificates.self_signed(&domain.name).await?)),
            None => Ok(Some(self.certificates.self_signed(WILDCARD_CERT).await?)),
        }
    }

    /// Everything `write` needs that may fail without touching the file:
    /// the bound domain and the TLS pair of an enabled service.
    async fn prepare(&self, service: &TcpService) -> ControlResult<Option<CertPair>> {
        let domain = match &service.domain {
            Some(name) => Some(self.domains.ensure_exists(name).await?),
            None => None,
        };
        if !service.enabled {
            return Ok(None);
        }
        self.tls_pair(service, domain.as_ref()).await
    }

    /// Write and activate the stream file of `service`. A disabled service
    /// leaves no file behind.
    pub async fn build(&self, service: &TcpService, restart: bool) -> ControlResult<Activation> {
        let tls = self.prepare(service).await?;
        self.write(service, tls.as_ref(), restart).await
    }

    async fn write(&self, service: &TcpService, tls: Option<&CertPair>, restart: bool) -> ControlResult<Activation> {
        let file = self.layout.stream_file(service.identifier.as_str());

        if !service.enabled {
            files::remove_file(&file).await?;
            if restart {
                self.control.reload().await?;
            }
            return Ok(Activation::Skipped);
        }

        files::save(&file, &self.render(service, tls)).await?;

        let activation = self.control.check_config(&file, restart).await?;
        tracing::info!(
            identifier = %service.identifier,
            port = service.port,
            protocol = %service.protocol,
            ?activation,
            "Stream service built"
        );
        Ok(activation)
    }

    pub async fn remove(&self, service: &TcpService, restart: bool) -> ControlResult<()> {
        files::remove_file(&self.layout.stream_file(service.identifier.as_str())).await?;

        self.reset.reset(&service.backend, service.protocol).await;

        if restart {
            self.control.reload().await?;
        }
        Ok(())
    }

    pub async fn create(&self, request: TcpServiceRequest) -> ControlResult<Applied<TcpService>> {
        let node = self.node(request.node_id).await?;

        let (port, reserved) = match request.port {
            Some(port) => (port, false),
            None => (self.store.reserve_port().await?, true),
        };

        let service = request.into_service(node, port, Identifier::generate());
        let checked = match service.validate() {
            Ok(()) if service.enabled => self.check_backend(&service.backend).await,
            other => other,
        };
        if let Err(e) = checked {
            if reserved {
                self.store.release_port(port).await?;
            }
            return Err(e);
        }

        let service = self.store.save(service).await?;
        let activation = self.build(&service, true).await?;
        Ok(Applied {
            record: service,
            activation,
        })
    }

    /// The backend of an enabled result is probed, and the store checks the
    /// new port, before anything on disk changes. A rejected update leaves
    /// the live file as it was.
    pub async fn update(&self, id: u64, changes: TcpServiceUpdate) -> ControlResult<Applied<TcpService>> {
        let old = self.get(id).await?;
        let node = match changes.node_id {
            Some(node_id) => Some(self.node(node_id).await?),
            None => None,
        };

        let mut service = old.clone();
        service.apply(changes, node);
        service.validate()?;

        if service.enabled {
            self.check_backend(&service.backend).await?;
        }

        let tls = self.prepare(&service).await?;
        let service = self.store.save(service).await?;

        // Same identifier, same file: `write` replaces or removes it.
        self.reset.reset(&old.backend, old.protocol).await;
        let activation = self.write(&service, tls.as_ref(), true).await?;
        Ok(Applied {
            record: service,
            activation,
        })
    }

    pub async fn enable(&self, id: u64) -> ControlResult<Applied<TcpService>> {
        self.update(
            id,
            TcpServiceUpdate {
                enabled: Some(true),
                ..TcpServiceUpdate::default()
            },
        )
        .await
    }

    pub async fn disable(&self, id: u64) -> ControlResult<Applied<TcpService>> {
        self.update(
            id,
            TcpServiceUpdate {
                enabled: Some(false),
                ..TcpServiceUpdate::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: u64) -> ControlResult<()> {
        let service = self.get(id).await?;
        self.remove(&service, true).await?;
        self.store.delete(id).await
    }

    /// Rebuild every enabled service without reloading.
    pub async fn initialize(&self) -> ControlResult<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        for service in self.store.all().await?.into_iter().filter(|s| s.enabled) {
            let resource = format!("tcp {}", service.identifier);
            let result = self.build(&service, false).await;
            outcomes.push(Outcome::from_result(resource, result));
        }
        Ok(outcomes)
    }
}
