//! `server` block builder, shared by HTTP virtual hosts and stream servers.

use std::path::Path;

use crate::conf::block::{wrap, ConfBlock};
use crate::conf::location::LocationConf;
use crate::conf::push_access;
use crate::model::{AccessList, CertPair};

#[derive(Debug, Clone, Default)]
pub struct ServerConf {
    block: ConfBlock,
}

impl ServerConf {
    pub fn new() -> Self {
        Self::default()
    }

    /// `listen <spec>;`, e.g. `443 ssl`, `[::]:443 ssl` or `5353 udp`.
    pub fn listen(&mut self, spec: &str) -> &mut Self {
        self.block.add_directive("listen", spec);
        self
    }

    pub fn server_name(&mut self, name: &str) -> &mut Self {
        self.block.add_directive("server_name", name);
        self
    }

    /// `access_log <path> [format];`
    pub fn access_log(&mut self, path: &Path, format: Option<&str>) -> &mut Self {
        let value = match format {
            Some(format) => format!("{} {format}", path.display()),
            None => path.display().to_string(),
        };
        self.block.add_directive("access_log", value);
        self
    }

    pub fn error_log(&mut self, path: &Path) -> &mut Self {
        self.block
            .add_directive("error_log", path.display().to_string());
        self
    }

    /// Certificate directives. HTTP and stream servers use the same names.
    pub fn ssl_certificates(&mut self, pair: &CertPair) -> &mut Self {
        self.block
            .add_directive("ssl_certificate", pair.certificate.display().to_string())
            .add_directive("ssl_certificate_key", pair.key.display().to_string());
        self
    }

    pub fn resolver(&mut self, address: &str) -> &mut Self {
        self.block
            .add_directive("resolver", format!("{address} valid=30s"));
        self
    }

    pub fn access(&mut self, access: &AccessList) -> &mut Self {
        push_access(&mut self.block, access);
        self
    }

    /// Nest a location. `matcher` is everything after `location`, e.g.
    /// `= /oauth2/auth` or `@logout`.
    pub fn location(&mut self, matcher: &str, location: &LocationConf) -> &mut Self {
        self.block
            .add_block(format!("location {matcher}"), location.body());
        self
    }

    /// Pull in externally managed fragments matching `glob`.
    pub fn include_locations(&mut self, glob: &Path) -> &mut Self {
        self.block.add_directive("include", glob.display().to_string());
        self
    }

    /// Stream servers forward to a named upstream.
    pub fn stream_proxy(&mut self, upstream: &str) -> &mut Self {
        self.block.add_directive("proxy_pass", upstream);
        self
    }

    pub fn body(&self) -> String {
        self.block.render()
    }

    pub fn render(&self) -> String {
        wrap("server", &self.body())
    }
}
