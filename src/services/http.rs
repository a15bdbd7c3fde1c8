//! HTTP services: one location fragment per path under a domain.

use std::sync::Arc;

use crate::conf::LocationConf;
use crate::error::{ControlError, ControlResult};
use crate::model::{Domain, HttpService, HttpServiceRequest, HttpServiceUpdate, Identifier, Node, StreamProtocol};
use crate::nginx::{files, Activation, ConfLayout, ConnectionReset, ProxyControl};
use crate::services::{Applied, DomainLifecycle, Outcome};
use crate::store::{HttpServiceStore, NodeStore};

pub struct HttpServiceManager {
    store: Arc<dyn HttpServiceStore>,
    nodes: Arc<dyn NodeStore>,
    domains: Arc<DomainLifecycle>,
    control: Arc<ProxyControl>,
    layout: Arc<ConfLayout>,
    reset: Arc<ConnectionReset>,
}

impl HttpServiceManager {
    pub fn new(
        store: Arc<dyn HttpServiceStore>,
        nodes: Arc<dyn NodeStore>,
        domains: Arc<DomainLifecycle>,
        control: Arc<ProxyControl>,
        layout: Arc<ConfLayout>,
        reset: Arc<ConnectionReset>,
    ) -> Self {
        Self {
            store,
            nodes,
            domains,
            control,
            layout,
            reset,
        }
    }

    pub async fn all(&self) -> ControlResult<Vec<HttpService>> {
        self.store.all().await
    }

    pub async fn get(&self, id: u64) -> ControlResult<HttpService> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("http service {id}")))
    }

    async fn node(&self, id: u64) -> ControlResult<Node> {
        self.nodes
            .find(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("node {id}")))
    }

    /// Location for `service`. Auth gating needs a sidecar on the bound
    /// domain and is dropped without one.
    pub fn location_for(service: &HttpService, domain: Option<&Domain>) -> LocationConf {
        let mut location = LocationConf::new();

        if service.require_auth && domain.is_some_and(Domain::has_auth_sidecar) {
            location.auth_required();
        }

        location.access(&service.access);

        let backend = service.backend.resolve();
        if let Some(resolver) = &backend.resolver {
            location.resolver(resolver);
        }

        let variable = service.identifier.as_str();
        location
            .client_max_body_size("100m")
            .set_variable(variable, &backend.host)
            .proxy_pass(&format!("{}://${variable}:{}", service.scheme.as_str(), backend.port))
            .forwarded_headers();

        if service.scheme.is_encrypted() {
            location.proxy_ssl_verify(false);
        }

        location
    }

    /// Bound domain of an enabled service, created on demand.
    async fn bound_domain(&self, service: &HttpService) -> ControlResult<Option<Domain>> {
        match &service.domain {
            Some(name) if service.enabled => Ok(Some(self.domains.ensure_exists(name).await?)),
            _ => Ok(None),
        }
    }

    /// Write and activate the location of `service`. A disabled service
    /// leaves no file behind.
    pub async fn add(&self, service: &HttpService, restart: bool) -> ControlResult<Activation> {
        let domain = self.bound_domain(service).await?;
        self.write(service, domain.as_ref(), restart).await
    }

    async fn write(&self, service: &HttpService, domain: Option<&Domain>, restart: bool) -> ControlResult<Activation> {
        let file = self.layout.location_file(service.domain.as_deref(), &service.path);

        if !service.enabled {
            files::remove_file(&file).await?;
            if restart {
                self.control.reload().await?;
            }
            return Ok(Activation::Skipped);
        }

        let location = Self::location_for(service, domain);
        files::save(&file, &location.render(&service.path)).await?;

        let activation = self.control.check_config(&file, restart).await?;
        tracing::info!(
            identifier = %service.identifier,
            domain = service.domain.as_deref().unwrap_or("_"),
            path = %service.path,
            ?activation,
            "HTTP service built"
        );
        Ok(activation)
    }

    pub async fn remove(&self, service: &HttpService, restart: bool) -> ControlResult<()> {
        let file = self.layout.location_file(service.domain.as_deref(), &service.path);
        files::remove_file(&file).await?;

        self.reset.reset(&service.backend, StreamProtocol::Tcp).await;

        if restart {
            self.control.reload().await?;
        }
        Ok(())
    }

    pub async fn create(&self, request: HttpServiceRequest) -> ControlResult<Applied<HttpService>> {
        let node = self.node(request.node_id).await?;
        let service = request.into_service(node, Identifier::generate());
        service.validate()?;

        let service = self.store.save(service).await?;
        let activation = self.add(&service, true).await?;
        Ok(Applied {
            record: service,
            activation,
        })
    }

    /// Replace the old fragment with one for the updated record. Nothing on
    /// disk changes until the store has accepted the new record.
    pub async fn update(&self, id: u64, changes: HttpServiceUpdate) -> ControlResult<Applied<HttpService>> {
        let old = self.get(id).await?;
        let node = match changes.node_id {
            Some(node_id) => Some(self.node(node_id).await?),
            None => None,
        };

        let mut service = old.clone();
        service.apply(changes, node);
        service.validate()?;

        let domain = self.bound_domain(&service).await?;
        let service = self.store.save(service).await?;

        let old_file = self.layout.location_file(old.domain.as_deref(), &old.path);
        if old_file != self.layout.location_file(service.domain.as_deref(), &service.path) {
            files::remove_file(&old_file).await?;
        }
        self.reset.reset(&old.backend, StreamProtocol::Tcp).await;

        let activation = self.write(&service, domain.as_ref(), true).await?;
        Ok(Applied {
            record: service,
            activation,
        })
    }

    pub async fn delete(&self, id: u64) -> ControlResult<()> {
        let service = self.get(id).await?;
        self.remove(&service, true).await?;
        self.store.delete(id).await
    }

    /// Rebuild every service without reloading.
    pub async fn initialize(&self) -> ControlResult<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        for service in self.store.all().await? {
            let resource = format!("http {}", service.identifier);
            let result = self.add(&service, false).await;
            outcomes.push(Outcome::from_result(resource, result));
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessList, Backend, BackendScheme, SslTermination};

    fn service(node: Node, host: Option<&str>) -> HttpService {
        HttpService {
            id: 1,
            domain: Some("app.example.com".into()),
            path: "/api".into(),
            backend: Backend {
                node,
                host: host.map(str::to_string),
                port: 8443,
            },
            scheme: BackendScheme::Https,
            access: AccessList::default(),
            require_auth: true,
            enabled: true,
            identifier: Identifier::parse("s_api").unwrap(),
        }
    }

    fn gateway() -> Node {
        Node {
            id: 1,
            name: "gw".into(),
            address: "10.8.0.1".into(),
            is_gateway: true,
            is_local: false,
            wg_interface: Some("wg0".into()),
        }
    }

    #[test]
    fn test_gateway_name_gets_resolver_and_variable() {
        let service = service(gateway(), Some("db.lan"));
        let mut domain = Domain::new("app.example.com", SslTermination::SelfSigned);
        domain.auth_port = Some(4180);

        let expected = "\
location /api {
    auth_request /oauth2/auth;
    error_page 401 = /oauth2/sign_in;
    auth_request_set $user $upstream_http_x_auth_request_user;
    auth_request_set $email $upstream_http_x_auth_request_email;
    proxy_set_header X-User $user;
    proxy_set_header X-Email $email;
    resolver 10.8.0.1 valid=30s;
    client_max_body_size 100m;
    set $s_api db.lan;
    proxy_pass https://$s_api:8443;
    proxy_set_header Host $host;
    proxy_set_header X-Real-IP $remote_addr;
    proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    proxy_set_header X-Forwarded-Proto $scheme;
    proxy_ssl_verify off;
}
";
        assert_eq!(
            HttpServiceManager::location_for(&service, Some(&domain)).render("/api"),
            expected
        );
    }

    #[test]
    fn test_auth_dropped_without_sidecar() {
        let service = service(gateway(), Some("10.0.0.5"));
        let domain = Domain::new("app.example.com", SslTermination::SelfSigned);

        let text = HttpServiceManager::location_for(&service, Some(&domain)).render("/api");
        assert!(!text.contains("auth_request"));
        assert!(!text.contains("resolver"));
        assert!(text.contains("set $s_api 10.0.0.5;"));
    }
}
