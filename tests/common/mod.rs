//! Shared fakes and a tempdir-backed engine for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use gateway_control::config::{ControlConfig, PathsConfig};
use gateway_control::external::{
    CommandRunner, IptablesRuleEngine, OpensslCertbotProvider, ReachabilityProbe, SupervisorSidecarManager,
};
use gateway_control::model::Node;
use gateway_control::store::MemoryStore;
use gateway_control::{Adapters, ControlError, ControlResult, Engine, Stores};

/// Records every command. `nginx -t` fails while any live `.conf` file
/// contains a poisoned string, which mimics a global config test.
pub struct FakeRunner {
    roots: Vec<PathBuf>,
    calls: Mutex<Vec<String>>,
    poison: Mutex<Vec<String>>,
    failing_prefixes: Mutex<Vec<String>>,
}

impl FakeRunner {
    fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            calls: Mutex::new(Vec::new()),
            poison: Mutex::new(Vec::new()),
            failing_prefixes: Mutex::new(Vec::new()),
        }
    }

    pub fn poison(&self, marker: &str) {
        self.poison.lock().unwrap().push(marker.to_string());
    }

    pub fn cure(&self) {
        self.poison.lock().unwrap().clear();
    }

    pub fn fail_commands_starting_with(&self, prefix: &str) {
        self.failing_prefixes.lock().unwrap().push(prefix.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn tree_is_poisoned(&self) -> bool {
        let poison = self.poison.lock().unwrap().clone();
        if poison.is_empty() {
            return false;
        }
        self.roots
            .iter()
            .flat_map(|root| conf_files(root))
            .filter_map(|file| std::fs::read_to_string(file).ok())
            .any(|text| poison.iter().any(|p| text.contains(p.as_str())))
    }
}

fn conf_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(conf_files(&path));
        } else if path.extension().is_some_and(|e| e == "conf") {
            out.push(path);
        }
    }
    out
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str) -> ControlResult<String> {
        self.calls.lock().unwrap().push(command.to_string());

        let fails = if command == "nginx -t" {
            self.tree_is_poisoned()
        } else {
            self.failing_prefixes
                .lock()
                .unwrap()
                .iter()
                .any(|p| command.starts_with(p.as_str()))
        };

        if fails {
            Err(ControlError::Command {
                command: command.to_string(),
                output: "simulated failure".to_string(),
            })
        } else {
            Ok(String::new())
        }
    }
}

/// Every port is reachable unless listed; no name resolves here unless listed.
#[derive(Default)]
pub struct FakeProbe {
    unreachable: Mutex<HashSet<u16>>,
    local_names: Mutex<HashSet<String>>,
    checks: Mutex<Vec<(String, u16, Option<String>)>>,
}

impl FakeProbe {
    pub fn block_port(&self, port: u16) {
        self.unreachable.lock().unwrap().insert(port);
    }

    pub fn resolve_here(&self, name: &str) {
        self.local_names.lock().unwrap().insert(name.to_string());
    }

    pub fn checks(&self) -> Vec<(String, u16, Option<String>)> {
        self.checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn check_port(&self, host: &str, port: u16, resolver: Option<&str>) -> bool {
        self.checks
            .lock()
            .unwrap()
            .push((host.to_string(), port, resolver.map(str::to_string)));
        !self.unreachable.lock().unwrap().contains(&port)
    }

    async fn resolves_to_this_host(&self, name: &str) -> bool {
        self.local_names.lock().unwrap().contains(name)
    }
}

pub const PLAIN_NODE: u64 = 1;
pub const GATEWAY_NODE: u64 = 2;

/// Engine over a temporary file tree with recording adapters.
pub struct Harness {
    pub dir: TempDir,
    pub config: ControlConfig,
    pub store: Arc<MemoryStore>,
    pub runner: Arc<FakeRunner>,
    pub probe: Arc<FakeProbe>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut config = ControlConfig::default();
        config.paths = PathsConfig {
            conf_dir: root.join("nginx/conf.d"),
            locations_dir: root.join("nginx/locations"),
            stream_dir: root.join("nginx/stream.d"),
            logs_dir: root.join("log/nginx"),
            default_pages: PathBuf::from("/etc/nginx/default_pages"),
        };
        config.appliance.self_signed_dir = root.join("ssl");
        config.appliance.certbot_live_dir = root.join("letsencrypt/live");
        config.sidecar.cookie_dir = root.join("oauth2/cookies");
        config.sidecar.emails_dir = root.join("oauth2/emails");
        config.sidecar.supervisor_dir = root.join("supervisor");

        let runner = Arc::new(FakeRunner::new(vec![
            config.paths.conf_dir.clone(),
            config.paths.locations_dir.clone(),
            config.paths.stream_dir.clone(),
        ]));
        let probe = Arc::new(FakeProbe::default());

        let adapters = Adapters {
            runner: runner.clone(),
            certificates: Arc::new(OpensslCertbotProvider::new(
                runner.clone(),
                config.appliance.self_signed_dir.clone(),
                config.appliance.certbot_live_dir.clone(),
                None,
            )),
            sidecars: Arc::new(SupervisorSidecarManager::new(runner.clone(), config.sidecar.clone())),
            rules: Arc::new(IptablesRuleEngine::new(runner.clone(), "iptables")),
            probe: probe.clone(),
        };

        let store = Arc::new(MemoryStore::from_config(&config.appliance));
        store.insert_node(Node {
            id: PLAIN_NODE,
            name: "worker".into(),
            address: "10.8.0.2".into(),
            is_gateway: false,
            is_local: false,
            wg_interface: Some("wg0".into()),
        });
        store.insert_node(Node {
            id: GATEWAY_NODE,
            name: "office".into(),
            address: "10.8.0.1".into(),
            is_gateway: true,
            is_local: false,
            wg_interface: Some("wg0".into()),
        });

        let engine = Engine::new(&config, Stores::memory(store.clone()), adapters);

        Self {
            dir,
            config,
            store,
            runner,
            probe,
            engine,
        }
    }

    pub fn vhost(&self, domain: &str) -> PathBuf {
        self.config.paths.conf_dir.join(format!("{domain}.conf"))
    }

    pub fn location(&self, domain: &str, name: &str) -> PathBuf {
        self.config.paths.locations_dir.join(domain).join(format!("{name}.conf"))
    }

    pub fn stream(&self, identifier: &str) -> PathBuf {
        self.config.paths.stream_dir.join(format!("{identifier}.conf"))
    }

    pub fn self_signed_dir(&self, name: &str) -> PathBuf {
        self.config.appliance.self_signed_dir.join(name)
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
    }

    pub fn reloads(&self) -> usize {
        self.runner.count("nginx -s reload")
    }
}
