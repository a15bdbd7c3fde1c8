//! On-disk layout of generated proxy files.

use std::path::{Path, PathBuf};

use crate::config::PathsConfig;

/// Appended to a file that failed the proxy's config test.
pub const QUARANTINE_SUFFIX: &str = ".err";

/// Location subdirectory for services without a domain.
const DEFAULT_LOCATIONS: &str = "default";

/// Log subdirectory for stream services without a domain.
const UNBOUND_LOGS: &str = "_";

#[derive(Debug, Clone)]
pub struct ConfLayout {
    paths: PathsConfig,
}

impl ConfLayout {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    /// Every directory the proxy loads generated files from.
    pub fn roots(&self) -> [&Path; 3] {
        [
            &self.paths.conf_dir,
            &self.paths.locations_dir,
            &self.paths.stream_dir,
        ]
    }

    pub fn vhost_file(&self, domain: &str) -> PathBuf {
        self.paths.conf_dir.join(format!("{domain}.conf"))
    }

    pub fn locations_dir(&self, domain: Option<&str>) -> PathBuf {
        let dir = match domain {
            Some(name) if name != UNBOUND_LOGS => name,
            _ => DEFAULT_LOCATIONS,
        };
        self.paths.locations_dir.join(dir)
    }

    pub fn location_file(&self, domain: Option<&str>, path: &str) -> PathBuf {
        self.locations_dir(domain)
            .join(format!("{}.conf", location_name(path)))
    }

    /// Glob a virtual host includes to pick up its location fragments.
    pub fn locations_glob(&self, domain: &str) -> PathBuf {
        self.locations_dir(Some(domain)).join("*.conf")
    }

    pub fn stream_file(&self, identifier: &str) -> PathBuf {
        self.paths.stream_dir.join(format!("{identifier}.conf"))
    }

    pub fn log_dir(&self, domain: Option<&str>) -> PathBuf {
        self.paths.logs_dir.join(domain.unwrap_or(UNBOUND_LOGS))
    }

    pub fn log_file(&self, domain: Option<&str>, file: &str) -> PathBuf {
        self.log_dir(domain).join(file)
    }

    pub fn default_pages(&self) -> &Path {
        &self.paths.default_pages
    }
}

/// File stem for a location path: `/` is `__main`, otherwise the leading
/// slash is dropped and the remaining ones become `-`.
pub fn location_name(path: &str) -> String {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        "__main".to_string()
    } else {
        trimmed.replace('/', "-")
    }
}

/// Where a failing file is moved.
pub fn quarantine_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(QUARANTINE_SUFFIX);
    PathBuf::from(name)
}
