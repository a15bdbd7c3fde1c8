//! Domain lifecycle: certificates, auth sidecar and the virtual host.

use std::sync::Arc;

use crate::conf::{LocationConf, ServerConf};
use crate::error::{ControlError, ControlResult};
use crate::external::{AuthSidecarManager, CertificateProvider, ReachabilityProbe};
use crate::model::{Domain, DomainRequest, DomainUpdate, SslTermination};
use crate::nginx::layout::quarantine_path;
use crate::nginx::{files, Activation, ConfLayout, ProxyControl};
use crate::services::{Applied, Outcome};
use crate::store::DomainStore;

const SIGN_OUT_LOCATION: &str = "@logout_and_retry";

pub struct DomainLifecycle {
    store: Arc<dyn DomainStore>,
    certificates: Arc<dyn CertificateProvider>,
    sidecars: Arc<dyn AuthSidecarManager>,
    probe: Arc<dyn ReachabilityProbe>,
    control: Arc<ProxyControl>,
    layout: Arc<ConfLayout>,
}

impl DomainLifecycle {
    pub fn new(
        store: Arc<dyn DomainStore>,
        certificates: Arc<dyn CertificateProvider>,
        sidecars: Arc<dyn AuthSidecarManager>,
        probe: Arc<dyn ReachabilityProbe>,
        control: Arc<ProxyControl>,
        layout: Arc<ConfLayout>,
    ) -> Self {
        Self {
            store,
            certificates,
            sidecars,
            probe,
            control,
            layout,
        }
    }

    pub async fn all(&self) -> ControlResult<Vec<Domain>> {
        self.store.all().await
    }

    pub async fn get(&self, id: u64) -> ControlResult<Domain> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("domain {id}")))
    }

    pub async fn find_by_name(&self, name: &str) -> ControlResult<Option<Domain>> {
        self.store.find_by_name(name).await
    }

    /// Rebuild the virtual host of `domain`.
    ///
    /// The certificate and the auth sidecar are provisioned before any file
    /// is written; a failure there leaves the current files untouched.
    pub async fn build(&self, domain: &mut Domain, restart: bool) -> ControlResult<Activation> {
        if domain.needs_certificate() {
            let pair = self.certificates.get(&domain.name, domain.ssl).await?;
            domain.cert_pair = Some(pair);
            *domain = self.store.save(domain.clone()).await?;
        }

        if domain.has_auth_sidecar() {
            self.sidecars.provision(domain, restart).await?;
        }

        let file = self.layout.vhost_file(&domain.name);
        files::save(&file, &self.render_vhost(domain)).await?;
        self.ensure_default_location(&domain.name).await?;

        let activation = self.control.check_config(&file, restart).await?;
        tracing::info!(domain = %domain.name, ?activation, "Domain built");
        Ok(activation)
    }

    /// Virtual host text for `domain`.
    pub fn render_vhost(&self, domain: &Domain) -> String {
        let name = domain.name.as_str();
        let mut server = ServerConf::new();

        if domain.ssl.requires_tls() {
            server.listen("443 ssl").listen("[::]:443 ssl");
        } else {
            server.listen("80").listen("[::]:80");
        }

        server
            .server_name(name)
            .access_log(&self.layout.log_file(Some(name), "access.log"), None)
            .error_log(&self.layout.log_file(Some(name), "error.log"));

        if let Some(pair) = domain.cert_pair.as_ref().filter(|_| domain.ssl.requires_tls()) {
            server.ssl_certificates(pair);
        }

        if let Some(port) = domain.auth_port {
            push_auth_locations(&mut server, port);
        }

        server.include_locations(&self.layout.locations_glob(name));
        server.render()
    }

    /// Write the catch-all `/` location unless one already exists. Returns
    /// whether a file was written.
    pub async fn ensure_default_location(&self, name: &str) -> ControlResult<bool> {
        let file = self.layout.location_file(Some(name), "/");
        if files::exists(&file).await? {
            return Ok(false);
        }

        let mut location = LocationConf::new();
        location.root(self.layout.default_pages());
        files::save(&file, &location.render("/")).await?;
        Ok(true)
    }

    /// Remove everything the domain put on disk or into the sidecar manager.
    pub async fn teardown(&self, domain: &Domain, restart: bool) -> ControlResult<()> {
        if domain.has_auth_sidecar() {
            self.sidecars.deprovision(domain).await?;
        }

        let vhost = self.layout.vhost_file(&domain.name);
        files::remove_file(&vhost).await?;
        files::remove_file(&quarantine_path(&vhost)).await?;

        match domain.ssl {
            SslTermination::SelfSigned => {
                let dir = self
                    .certificates
                    .certificate_dir(&domain.name, SslTermination::SelfSigned);
                files::remove_dir(&dir).await?;
            }
            SslTermination::Certbot => self.certificates.delete_managed(&domain.name).await?,
            SslTermination::None => {}
        }

        files::remove_dir(&self.layout.log_dir(Some(&domain.name))).await?;

        if restart {
            self.control.reload().await?;
        }

        tracing::info!(domain = %domain.name, "Domain torn down");
        Ok(())
    }

    /// Return the domain named `name`, creating it without a reload when it
    /// does not exist. Names resolving to this appliance get a public
    /// certificate, others a self-signed one.
    pub async fn ensure_exists(&self, name: &str) -> ControlResult<Domain> {
        if let Some(domain) = self.store.find_by_name(name).await? {
            return Ok(domain);
        }

        let ssl = if self.probe.resolves_to_this_host(name).await {
            SslTermination::Certbot
        } else {
            SslTermination::SelfSigned
        };

        tracing::info!(domain = name, %ssl, "Creating implicit domain");
        Ok(self.create(DomainRequest::new(name, ssl), false).await?.record)
    }

    pub async fn create(&self, request: DomainRequest, restart: bool) -> ControlResult<Applied<Domain>> {
        request.validate()?;
        if self.store.find_by_name(&request.name).await?.is_some() {
            return Err(ControlError::validation(
                "name",
                format!("domain `{}` already exists", request.name),
            ));
        }

        let auth_port = if request.authentication {
            Some(self.store.reserve_auth_port().await?)
        } else {
            None
        };

        let provisioned = self.provision(request.into_domain(auth_port)).await;
        let mut domain = match provisioned {
            Ok(domain) => domain,
            Err(e) => {
                if let Some(port) = auth_port {
                    self.store.release_auth_port(port).await?;
                }
                return Err(e);
            }
        };

        let activation = self.build(&mut domain, restart).await?;
        Ok(Applied {
            record: domain,
            activation,
        })
    }

    /// Certificate first, then the record.
    async fn provision(&self, mut domain: Domain) -> ControlResult<Domain> {
        if domain.ssl.requires_tls() {
            domain.cert_pair = Some(self.certificates.get(&domain.name, domain.ssl).await?);
        }
        self.store.save(domain).await
    }

    pub async fn update(&self, id: u64, changes: DomainUpdate) -> ControlResult<Applied<Domain>> {
        let old = self.get(id).await?;

        if changes.name.as_ref().is_some_and(|name| *name != old.name) {
            return Err(ControlError::validation(
                "name",
                "domain names can't be changed; add a new domain and delete this one instead",
            ));
        }

        let mut domain = old.clone();

        if let Some(ssl) = changes.ssl.filter(|ssl| *ssl != old.ssl) {
            domain.ssl = ssl;
            domain.cert_pair = if ssl.requires_tls() {
                Some(self.certificates.get(&domain.name, ssl).await?)
            } else {
                None
            };
        }

        if let Some(emails) = changes.allowed_emails {
            domain.allowed_emails = emails;
        }

        match (changes.authentication, old.auth_port) {
            (Some(true), None) => {
                domain.auth_port = Some(self.store.reserve_auth_port().await?);
            }
            (Some(false), Some(port)) => {
                self.sidecars.deprovision(&old).await?;
                self.store.release_auth_port(port).await?;
                domain.auth_port = None;
            }
            _ => {}
        }

        let mut domain = self.store.save(domain).await?;
        let activation = self.build(&mut domain, true).await?;
        Ok(Applied {
            record: domain,
            activation,
        })
    }

    pub async fn delete(&self, id: u64) -> ControlResult<()> {
        let domain = self.get(id).await?;
        self.teardown(&domain, true).await?;
        self.store.delete(id).await
    }

    /// Apply sidecar programs written by `build(_, false)`. Returns whether
    /// any domain has a sidecar to apply.
    pub async fn apply_sidecars(&self) -> ControlResult<bool> {
        let guarded = self.store.all().await?.iter().any(Domain::has_auth_sidecar);
        if guarded {
            self.sidecars.apply_pending().await?;
        }
        Ok(guarded)
    }

    /// Rebuild every domain without reloading. One failure never stops the
    /// others.
    pub async fn initialize(&self) -> ControlResult<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        for mut domain in self.store.all().await? {
            let resource = format!("domain {}", domain.name);
            let result = self.build(&mut domain, false).await;
            outcomes.push(Outcome::from_result(resource, result));
        }
        Ok(outcomes)
    }
}

/// The sidecar's own endpoints. `location /oauth2/` and `= /oauth2/auth`
/// forward headers only; the callback keeps the request body and turns a
/// rejected login into a sign-out.
fn push_auth_locations(server: &mut ServerConf, port: u16) {
    let upstream = format!("http://127.0.0.1:{port}");

    let mut base = LocationConf::new();
    base.proxy_pass(&upstream)
        .proxy_header("Host", "$host")
        .proxy_header("X-Forwarded-Host", "$host")
        .proxy_header("X-Real-IP", "$remote_addr");

    let mut endpoint = base.clone();
    endpoint
        .proxy_header("X-Auth-Request-Redirect", "$request_uri")
        .proxy_header("Content-Length", "\"\"")
        .directive("proxy_pass_request_body", "off");

    let mut callback = base;
    callback
        .directive("proxy_pass_request_headers", "on")
        .directive("proxy_pass_request_body", "on")
        .directive("error_page 403", &format!("= {SIGN_OUT_LOCATION}"));

    let mut sign_out = LocationConf::new();
    sign_out.directive("return 302", "/oauth2/sign_out");

    server
        .location("/oauth2/", &endpoint)
        .location("= /oauth2/auth", &endpoint)
        .location("= /oauth2/callback", &callback)
        .location(SIGN_OUT_LOCATION, &sign_out);
}
