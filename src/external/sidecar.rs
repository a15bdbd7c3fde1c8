//! Auth sidecar provisioning.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::SidecarConfig;
use crate::error::{ControlError, ControlResult};
use crate::external::commands::CommandRunner;
use crate::model::Domain;

/// Starts and stops the authenticating proxy that guards a domain.
#[async_trait]
pub trait AuthSidecarManager: Send + Sync {
    /// Make the sidecar for `domain` reachable on its auth port. With
    /// `restart` false, process changes may be applied later in bulk.
    async fn provision(&self, domain: &Domain, restart: bool) -> ControlResult<()>;

    async fn deprovision(&self, domain: &Domain) -> ControlResult<()>;

    /// Apply every change left pending by `provision(_, false)`.
    async fn apply_pending(&self) -> ControlResult<()>;
}

/// oauth2-proxy programs managed by supervisord.
pub struct SupervisorSidecarManager {
    runner: Arc<dyn CommandRunner>,
    config: SidecarConfig,
}

impl SupervisorSidecarManager {
    pub fn new(runner: Arc<dyn CommandRunner>, config: SidecarConfig) -> Self {
        Self { runner, config }
    }

    fn cookie_file(&self, domain: &Domain) -> PathBuf {
        self.config
            .cookie_dir
            .join(format!(".cookie-secret-{}", domain.name))
    }

    fn emails_file(&self, domain: &Domain) -> PathBuf {
        self.config
            .emails_dir
            .join(format!("{}-emails", domain.name))
    }

    fn program_file(&self, domain: &Domain) -> PathBuf {
        self.config
            .supervisor_dir
            .join(format!("oauth2-proxy-{}.conf", domain.name))
    }

    /// supervisord program definition for the sidecar.
    pub fn render_program(&self, domain: &Domain, port: u16) -> String {
        let mut command = format!(
            "{} --http-address=127.0.0.1:{port} --reverse-proxy=true --upstream=static://202 \
             --redirect-url=https://{}/oauth2/callback --cookie-secret-file={} \
             --authenticated-emails-file={}",
            self.config.binary.display(),
            domain.name,
            self.cookie_file(domain).display(),
            self.emails_file(domain).display(),
        );
        for arg in &self.config.extra_args {
            command.push(' ');
            command.push_str(arg);
        }

        format!(
            "[program:oauth2-proxy-{name}]\ncommand={command}\nautostart=true\nautorestart=true\n\
             stdout_logfile=/var/log/supervisor/oauth2-proxy-{name}.log\nredirect_stderr=true\n",
            name = domain.name,
        )
    }

    async fn apply(&self, scope: &str) -> ControlResult<()> {
        self.runner
            .run(&self.config.update_command)
            .await
            .map(|_| ())
            .map_err(|e| ControlError::Sidecar {
                domain: scope.to_string(),
                reason: e.to_string(),
            })
    }
}

async fn write_with_mode(path: &Path, contents: &str, mode: u32) -> ControlResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> ControlResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl AuthSidecarManager for SupervisorSidecarManager {
    async fn provision(&self, domain: &Domain, restart: bool) -> ControlResult<()> {
        let Some(port) = domain.auth_port else {
            return Err(ControlError::Sidecar {
                domain: domain.name.clone(),
                reason: "no auth port allocated".to_string(),
            });
        };

        let cookie = self.cookie_file(domain);
        if !tokio::fs::try_exists(&cookie).await? {
            // 32 hex characters: a valid 32-byte AES key for the cookie cipher.
            let secret = Uuid::new_v4().simple().to_string();
            write_with_mode(&cookie, &secret, 0o600).await?;
        }

        write_with_mode(&self.emails_file(domain), &domain.allowed_emails.join("\n"), 0o644).await?;
        write_with_mode(&self.program_file(domain), &self.render_program(domain, port), 0o644).await?;

        if restart {
            self.apply(&domain.name).await?;
        }

        tracing::info!(domain = %domain.name, port, "Auth sidecar provisioned");
        Ok(())
    }

    async fn deprovision(&self, domain: &Domain) -> ControlResult<()> {
        remove_if_present(&self.program_file(domain)).await?;
        remove_if_present(&self.cookie_file(domain)).await?;
        remove_if_present(&self.emails_file(domain)).await?;
        self.apply(&domain.name).await?;

        tracing::info!(domain = %domain.name, "Auth sidecar removed");
        Ok(())
    }

    async fn apply_pending(&self) -> ControlResult<()> {
        self.apply("*").await?;
        tracing::info!("Auth sidecar programs applied");
        Ok(())
    }
}
