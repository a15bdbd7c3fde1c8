//! `location` fragment builder.

use std::path::Path;

use crate::conf::block::{wrap, ConfBlock};
use crate::conf::push_access;
use crate::model::AccessList;

/// Builder for a path-scoped HTTP location.
#[derive(Debug, Clone, Default)]
pub struct LocationConf {
    block: ConfBlock,
}

impl LocationConf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw directive, for anything without a dedicated setter.
    pub fn directive(&mut self, name: &str, value: &str) -> &mut Self {
        self.block.add_directive(name, value);
        self
    }

    pub fn root(&mut self, dir: &Path) -> &mut Self {
        self.block.add_directive("root", dir.display().to_string());
        self
    }

    pub fn proxy_pass(&mut self, target: &str) -> &mut Self {
        self.block.add_directive("proxy_pass", target);
        self
    }

    pub fn proxy_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.block
            .add_directive(format!("proxy_set_header {name}"), value);
        self
    }

    /// Standard headers telling the backend who the original client was.
    pub fn forwarded_headers(&mut self) -> &mut Self {
        self.proxy_header("Host", "$host")
            .proxy_header("X-Real-IP", "$remote_addr")
            .proxy_header("X-Forwarded-For", "$proxy_add_x_forwarded_for")
            .proxy_header("X-Forwarded-Proto", "$scheme")
    }

    pub fn client_max_body_size(&mut self, size: &str) -> &mut Self {
        self.block.add_directive("client_max_body_size", size);
        self
    }

    pub fn proxy_ssl_verify(&mut self, verify: bool) -> &mut Self {
        self.block
            .add_directive("proxy_ssl_verify", if verify { "on" } else { "off" });
        self
    }

    pub fn resolver(&mut self, address: &str) -> &mut Self {
        self.block
            .add_directive("resolver", format!("{address} valid=30s"));
        self
    }

    /// Gate the location behind the domain's auth sidecar.
    pub fn auth_required(&mut self) -> &mut Self {
        self.block
            .add_directive("auth_request", "/oauth2/auth")
            .add_directive("error_page 401", "= /oauth2/sign_in")
            .add_directive("auth_request_set $user", "$upstream_http_x_auth_request_user")
            .add_directive("auth_request_set $email", "$upstream_http_x_auth_request_email");
        self.proxy_header("X-User", "$user")
            .proxy_header("X-Email", "$email")
    }

    /// `set $name value;`
    pub fn set_variable(&mut self, name: &str, value: &str) -> &mut Self {
        self.block.add_directive(format!("set ${name}"), value);
        self
    }

    pub fn access(&mut self, access: &AccessList) -> &mut Self {
        push_access(&mut self.block, access);
        self
    }

    /// Inner text, for nesting into a server block.
    pub fn body(&self) -> String {
        self.block.render()
    }

    /// Standalone `location <path> { … }` fragment.
    pub fn render(&self, path: &str) -> String {
        wrap(&format!("location {path}"), &self.body())
    }
}
