//! In-memory record store backed by `DashMap`.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::{ApplianceConfig, Inventory, PortRange};
use crate::error::{ControlError, ControlResult};
use crate::model::{Domain, HttpService, Identifier, Node, TcpService};
use crate::nginx::location_name;
use crate::store::{DomainStore, HttpServiceStore, NodeStore, TcpServiceStore};

/// Placeholder owner of a listen port reserved but not yet saved.
const RESERVED: u64 = 0;

/// Every store trait over concurrent maps.
pub struct MemoryStore {
    next_id: AtomicU64,
    nodes: DashMap<u64, Node>,
    domains: DashMap<u64, Domain>,
    domain_names: DashMap<String, u64>,
    http_services: DashMap<u64, HttpService>,
    tcp_services: DashMap<u64, TcpService>,
    /// Service identifiers, shared by HTTP and stream services.
    identifiers: DashMap<Identifier, u64>,
    /// (domain, location file stem) of every HTTP service.
    locations: DashMap<(String, String), u64>,
    auth_ports: DashMap<u16, ()>,
    listen_ports: DashMap<u16, u64>,
    auth_range: PortRange,
    stream_range: PortRange,
}

impl MemoryStore {
    pub fn new(auth_range: PortRange, stream_range: PortRange) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            nodes: DashMap::new(),
            domains: DashMap::new(),
            domain_names: DashMap::new(),
            http_services: DashMap::new(),
            tcp_services: DashMap::new(),
            identifiers: DashMap::new(),
            locations: DashMap::new(),
            auth_ports: DashMap::new(),
            listen_ports: DashMap::new(),
            auth_range,
            stream_range,
        }
    }

    pub fn from_config(appliance: &ApplianceConfig) -> Self {
        Self::new(appliance.auth_ports, appliance.stream_ports)
    }

    fn assign_id(&self, id: u64) -> u64 {
        if id == 0 {
            self.next_id.fetch_add(1, Ordering::Relaxed)
        } else {
            self.next_id.fetch_max(id + 1, Ordering::Relaxed);
            id
        }
    }

    pub fn insert_node(&self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    fn node(&self, id: u64) -> ControlResult<Node> {
        self.nodes
            .get(&id)
            .map(|n| n.value().clone())
            .ok_or_else(|| ControlError::NotFound(format!("node {id}")))
    }

    /// Load an inventory. Records are validated but nothing is rendered.
    pub async fn seed(&self, inventory: Inventory) -> ControlResult<()> {
        for node in inventory.nodes {
            self.insert_node(node);
        }

        for request in inventory.domains {
            request.validate()?;
            let auth_port = if request.authentication {
                Some(self.reserve_auth_port().await?)
            } else {
                None
            };
            DomainStore::save(self, request.into_domain(auth_port)).await?;
        }

        for entry in inventory.http_services {
            let node = self.node(entry.service.node_id)?;
            let service = entry.service.into_service(node, entry.identifier);
            service.validate()?;
            HttpServiceStore::save(self, service).await?;
        }

        for entry in inventory.tcp_services {
            let node = self.node(entry.service.node_id)?;
            let port = match entry.service.port {
                Some(port) => port,
                None => self.reserve_port().await?,
            };
            let service = entry.service.into_service(node, port, entry.identifier);
            service.validate()?;
            TcpServiceStore::save(self, service).await?;
        }

        tracing::debug!(
            nodes = self.nodes.len(),
            domains = self.domains.len(),
            http_services = self.http_services.len(),
            tcp_services = self.tcp_services.len(),
            "Inventory seeded"
        );
        Ok(())
    }
}

/// Claim `key` for record `id`. Returns whether the claim is new, so a
/// failed save can give it back.
fn claim<K: Eq + Hash>(
    index: &DashMap<K, u64>,
    key: K,
    id: u64,
    field: &str,
    taken: impl FnOnce() -> String,
) -> ControlResult<bool> {
    match index.entry(key) {
        Entry::Occupied(owner) if *owner.get() != id => Err(ControlError::validation(field, taken())),
        Entry::Occupied(_) => Ok(false),
        Entry::Vacant(slot) => {
            slot.insert(id);
            Ok(true)
        }
    }
}

fn release<K: Eq + Hash>(index: &DashMap<K, u64>, key: &K, id: u64) {
    index.remove_if(key, |_, owner| *owner == id);
}

fn location_key(service: &HttpService) -> (String, String) {
    (
        service.domain.clone().unwrap_or_default(),
        location_name(&service.path),
    )
}

fn sorted<T: Clone>(map: &DashMap<u64, T>) -> Vec<T> {
    let mut entries: Vec<(u64, T)> = map.iter().map(|r| (*r.key(), r.value().clone())).collect();
    entries.sort_by_key(|(id, _)| *id);
    entries.into_iter().map(|(_, v)| v).collect()
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn find(&self, id: u64) -> ControlResult<Option<Domain>> {
        Ok(self.domains.get(&id).map(|d| d.value().clone()))
    }

    async fn find_by_name(&self, name: &str) -> ControlResult<Option<Domain>> {
        let id = self.domain_names.get(name).map(|r| *r.value());
        Ok(id.and_then(|id| self.domains.get(&id).map(|d| d.value().clone())))
    }

    async fn all(&self) -> ControlResult<Vec<Domain>> {
        Ok(sorted(&self.domains))
    }

    async fn save(&self, mut domain: Domain) -> ControlResult<Domain> {
        domain.id = self.assign_id(domain.id);

        match self.domain_names.entry(domain.name.clone()) {
            Entry::Occupied(owner) if *owner.get() != domain.id => {
                return Err(ControlError::validation(
                    "name",
                    format!("domain `{}` already exists", domain.name),
                ));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(domain.id);
            }
        }

        if let Some(port) = domain.auth_port {
            self.auth_ports.insert(port, ());
        }

        let previous = self.domains.insert(domain.id, domain.clone());
        if let Some(previous) = previous {
            if previous.name != domain.name {
                self.domain_names.remove(&previous.name);
            }
        }
        Ok(domain)
    }

    async fn delete(&self, id: u64) -> ControlResult<()> {
        let (_, domain) = self
            .domains
            .remove(&id)
            .ok_or_else(|| ControlError::NotFound(format!("domain {id}")))?;
        self.domain_names.remove(&domain.name);
        if let Some(port) = domain.auth_port {
            self.auth_ports.remove(&port);
        }
        Ok(())
    }

    async fn reserve_auth_port(&self) -> ControlResult<u16> {
        for port in self.auth_range.start..=self.auth_range.end {
            if let Entry::Vacant(slot) = self.auth_ports.entry(port) {
                slot.insert(());
                return Ok(port);
            }
        }
        Err(ControlError::Store("auth port pool exhausted".to_string()))
    }

    async fn release_auth_port(&self, port: u16) -> ControlResult<()> {
        self.auth_ports.remove(&port);
        Ok(())
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn find(&self, id: u64) -> ControlResult<Option<Node>> {
        Ok(self.nodes.get(&id).map(|n| n.value().clone()))
    }
}

#[async_trait]
impl HttpServiceStore for MemoryStore {
    async fn find(&self, id: u64) -> ControlResult<Option<HttpService>> {
        Ok(self.http_services.get(&id).map(|s| s.value().clone()))
    }

    async fn all(&self) -> ControlResult<Vec<HttpService>> {
        Ok(sorted(&self.http_services))
    }

    async fn save(&self, mut service: HttpService) -> ControlResult<HttpService> {
        service.id = self.assign_id(service.id);
        let id = service.id;

        let identifier = service.identifier.clone();
        let fresh = claim(&self.identifiers, identifier.clone(), id, "identifier", || {
            format!("identifier `{identifier}` is already in use")
        })?;

        let location = location_key(&service);
        let claimed = claim(&self.locations, location.clone(), id, "path", || {
            format!(
                "`{}` on `{}` is already served by another service",
                service.path,
                service.domain.as_deref().unwrap_or("_")
            )
        });
        if let Err(e) = claimed {
            if fresh {
                release(&self.identifiers, &identifier, id);
            }
            return Err(e);
        }

        if let Some(previous) = self.http_services.insert(id, service.clone()) {
            if previous.identifier != service.identifier {
                release(&self.identifiers, &previous.identifier, id);
            }
            let previous_location = location_key(&previous);
            if previous_location != location {
                release(&self.locations, &previous_location, id);
            }
        }
        Ok(service)
    }

    async fn delete(&self, id: u64) -> ControlResult<()> {
        let (_, service) = self
            .http_services
            .remove(&id)
            .ok_or_else(|| ControlError::NotFound(format!("http service {id}")))?;
        release(&self.identifiers, &service.identifier, id);
        release(&self.locations, &location_key(&service), id);
        Ok(())
    }
}

#[async_trait]
impl TcpServiceStore for MemoryStore {
    async fn find(&self, id: u64) -> ControlResult<Option<TcpService>> {
        Ok(self.tcp_services.get(&id).map(|s| s.value().clone()))
    }

    async fn all(&self) -> ControlResult<Vec<TcpService>> {
        Ok(sorted(&self.tcp_services))
    }

    async fn save(&self, mut service: TcpService) -> ControlResult<TcpService> {
        service.id = self.assign_id(service.id);
        let id = service.id;

        let identifier = service.identifier.clone();
        let fresh = claim(&self.identifiers, identifier.clone(), id, "identifier", || {
            format!("identifier `{identifier}` is already in use")
        })?;

        let port_taken = match self.listen_ports.entry(service.port) {
            Entry::Occupied(owner) if *owner.get() != RESERVED && *owner.get() != id => true,
            Entry::Occupied(mut owner) => {
                owner.insert(id);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
                false
            }
        };
        if port_taken {
            if fresh {
                release(&self.identifiers, &identifier, id);
            }
            return Err(ControlError::validation(
                "port",
                format!("port {} is already in use", service.port),
            ));
        }

        if let Some(previous) = self.tcp_services.insert(id, service.clone()) {
            if previous.identifier != service.identifier {
                release(&self.identifiers, &previous.identifier, id);
            }
            if previous.port != service.port {
                release(&self.listen_ports, &previous.port, id);
            }
        }
        Ok(service)
    }

    async fn delete(&self, id: u64) -> ControlResult<()> {
        let (_, service) = self
            .tcp_services
            .remove(&id)
            .ok_or_else(|| ControlError::NotFound(format!("tcp service {id}")))?;
        release(&self.identifiers, &service.identifier, id);
        release(&self.listen_ports, &service.port, id);
        Ok(())
    }

    async fn reserve_port(&self) -> ControlResult<u16> {
        for port in self.stream_range.start..=self.stream_range.end {
            if let Entry::Vacant(slot) = self.listen_ports.entry(port) {
                slot.insert(RESERVED);
                return Ok(port);
            }
        }
        Err(ControlError::Store("stream port pool exhausted".to_string()))
    }

    async fn release_port(&self, port: u16) -> ControlResult<()> {
        self.listen_ports.remove_if(&port, |_, owner| *owner == RESERVED);
        Ok(())
    }
}
