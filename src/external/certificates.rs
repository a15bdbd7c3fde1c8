//! Certificate provisioning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ControlError, ControlResult};
use crate::external::commands::{quote, quote_path, CommandRunner};
use crate::model::{CertPair, SslTermination};

const CERT_FILE: &str = "fullchain.pem";
const KEY_FILE: &str = "privkey.pem";

/// Issues, reuses and revokes certificates.
#[async_trait]
pub trait CertificateProvider: Send + Sync {
    /// Provision a pair for `domain` in the given mode. `SslTermination::None`
    /// is rejected.
    async fn get(&self, domain: &str, mode: SslTermination) -> ControlResult<CertPair>;

    /// Self-signed pair for `name`, reused when already on disk.
    async fn self_signed(&self, name: &str) -> ControlResult<CertPair>;

    /// Revoke and delete a certificate managed by an external authority.
    async fn delete_managed(&self, domain: &str) -> ControlResult<()>;

    /// Directory holding the pair for `domain`.
    fn certificate_dir(&self, domain: &str, mode: SslTermination) -> PathBuf;
}

/// Self-signed pairs via `openssl`, public ones via `certbot`.
pub struct OpensslCertbotProvider {
    runner: Arc<dyn CommandRunner>,
    self_signed_dir: PathBuf,
    certbot_live_dir: PathBuf,
    certbot_email: Option<String>,
}

impl OpensslCertbotProvider {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        self_signed_dir: impl Into<PathBuf>,
        certbot_live_dir: impl Into<PathBuf>,
        certbot_email: Option<String>,
    ) -> Self {
        Self {
            runner,
            self_signed_dir: self_signed_dir.into(),
            certbot_live_dir: certbot_live_dir.into(),
            certbot_email,
        }
    }

    fn pair_in(dir: &Path) -> CertPair {
        CertPair {
            certificate: dir.join(CERT_FILE),
            key: dir.join(KEY_FILE),
        }
    }

    async fn certbot(&self, domain: &str) -> ControlResult<CertPair> {
        let registration = match &self.certbot_email {
            Some(email) => format!("--email {}", quote(email)),
            None => "--register-unsafely-without-email".to_string(),
        };
        let name = quote(domain);
        let command = format!("certbot certonly --nginx -n --agree-tos {registration} --cert-name {name} -d {name}");
        self.runner
            .run(&command)
            .await
            .map_err(|e| ControlError::Certificate {
                domain: domain.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self::pair_in(&self.certbot_live_dir.join(domain)))
    }
}

#[async_trait]
impl CertificateProvider for OpensslCertbotProvider {
    async fn get(&self, domain: &str, mode: SslTermination) -> ControlResult<CertPair> {
        match mode {
            SslTermination::SelfSigned => self.self_signed(domain).await,
            SslTermination::Certbot => self.certbot(domain).await,
            SslTermination::None => Err(ControlError::Certificate {
                domain: domain.to_string(),
                reason: "TLS termination is disabled for this domain".to_string(),
            }),
        }
    }

    async fn self_signed(&self, name: &str) -> ControlResult<CertPair> {
        let dir = self.self_signed_dir.join(name);
        let pair = Self::pair_in(&dir);

        if tokio::fs::try_exists(&pair.certificate).await? && tokio::fs::try_exists(&pair.key).await? {
            return Ok(pair);
        }

        tokio::fs::create_dir_all(&dir).await?;
        let command = format!(
            "openssl req -x509 -nodes -newkey rsa:2048 -days 3650 -subj {} -keyout {} -out {}",
            quote(&format!("/CN={name}")),
            quote_path(&pair.key),
            quote_path(&pair.certificate)
        );
        self.runner
            .run(&command)
            .await
            .map_err(|e| ControlError::Certificate {
                domain: name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(name, dir = %dir.display(), "Generated self-signed certificate");
        Ok(pair)
    }

    async fn delete_managed(&self, domain: &str) -> ControlResult<()> {
        self.runner
            .run(&format!("certbot delete --cert-name {} -n", quote(domain)))
            .await
            .map(|_| ())
            .map_err(|e| ControlError::Certificate {
                domain: domain.to_string(),
                reason: e.to_string(),
            })
    }

    fn certificate_dir(&self, domain: &str, mode: SslTermination) -> PathBuf {
        match mode {
            SslTermination::Certbot => self.certbot_live_dir.join(domain),
            _ => self.self_signed_dir.join(domain),
        }
    }
}
