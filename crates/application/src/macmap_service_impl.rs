use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use domain::common::entity::VlanId;
use domain::common::error::DomainError;
use domain::macmap::entity::{
    MacMapRef, MacMapSettings, MacVlan, PortFilter, PortVlan, SwitchPort,
};
use domain::macmap::error::MacMapError;
use domain::macmap::state::{Activation, MacMapState};
use ports::secondary::macmap_replication_port::MacMapReplicationPort;
use ports::secondary::metrics_port::MetricsPort;
use tracing::{debug, info, warn};

/// Hosts removed by a bulk operation and the networks it drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inactivation {
    pub hosts: BTreeMap<MacVlan, SwitchPort>,
    pub released: BTreeSet<PortVlan>,
}

impl Inactivation {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

struct MacMapEntry {
    settings: MacMapSettings,
    state: MacMapState,
}

/// Application-level MAC mapping service.
///
/// Owns one `MacMapState` per MAC mapping. Every mutating call reads the
/// dirty flag of the touched state before returning and publishes the
/// state through the replication port when it is set. Designed to be
/// wrapped in `RwLock`; mutators take `&mut self` so the flag is always
/// consumed under the write lock.
pub struct MacMapAppService {
    maps: BTreeMap<MacMapRef, MacMapEntry>,
    replication: Option<Arc<dyn MacMapReplicationPort>>,
    metrics: Arc<dyn MetricsPort>,
}

impl MacMapAppService {
    pub fn new(
        replication: Option<Arc<dyn MacMapReplicationPort>>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            maps: BTreeMap::new(),
            replication,
            metrics,
        }
    }

    /// Create or update a MAC mapping. Active hosts no longer admitted by
    /// the new settings are inactivated.
    pub fn reconfigure(&mut self, settings: MacMapSettings) -> Inactivation {
        let map = settings.map.clone();
        let entry = self
            .maps
            .entry(map.clone())
            .or_insert_with(|| MacMapEntry {
                settings: settings.clone(),
                state: MacMapState::new(),
            });
        entry.settings = settings;

        // VLANs that still carry active hosts but are no longer mapped.
        let unmapped: BTreeSet<VlanId> = entry
            .state
            .active_hosts()
            .unwrap_or_default()
            .keys()
            .map(|host| host.vlan())
            .filter(|vlan| !entry.settings.mapped_vlans.contains(vlan))
            .collect();

        let mut released = BTreeSet::new();
        let hosts = entry.state.inactivate_unmapped(
            &map,
            &entry.settings.allowed_hosts,
            &unmapped,
            &mut released,
        );
        if !hosts.is_empty() {
            info!(map = %map, removed = hosts.len(), "hosts left MAC mapping after reconfiguration");
        }
        self.sync(&map);
        Inactivation { hosts, released }
    }

    /// Drop a MAC mapping and every host it holds.
    pub fn remove(&mut self, map: &MacMapRef) -> Result<Inactivation, DomainError> {
        let mut entry = self.maps.remove(map).ok_or_else(|| not_found(map))?;
        let mut released = BTreeSet::new();
        let hosts = entry.state.inactivate_ports(&|_: &SwitchPort| true, &mut released);
        info!(map = %map, removed = hosts.len(), "MAC mapping removed");
        publish_if_dirty(self.replication.as_deref(), self.metrics.as_ref(), map, &mut entry.state);
        Ok(Inactivation { hosts, released })
    }

    /// A host was seen on `port`. Binds it if the mapping admits it.
    pub fn learn(
        &mut self,
        map: &MacMapRef,
        host: MacVlan,
        port: SwitchPort,
    ) -> Result<Activation, DomainError> {
        let entry = self.maps.get_mut(map).ok_or_else(|| not_found(map))?;
        if !entry.settings.admits(host) {
            return Err(DomainError::BadRequest(format!(
                "{map}: host {host} is not admitted"
            )));
        }

        let activation = match entry.state.activate(map, host, port) {
            Ok(activation) => activation,
            Err(e @ MacMapError::Duplicate { .. }) => {
                warn!(map = %map, host = %host, port = %port, error = %e, "duplicate MAC mapping");
                self.metrics.record_macmap_duplicate(&map.to_string());
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        match activation {
            Activation::Unchanged => {}
            Activation::Moved { old } => {
                info!(map = %map, host = %host, from = %old, to = %port, "host moved");
            }
            Activation::Activated { first } => {
                debug!(map = %map, host = %host, port = %port, first, "host activated");
            }
        }
        self.sync(map);
        Ok(activation)
    }

    /// A host aged out. Returns the port it was bound to and the network
    /// it drained, if any.
    pub fn age_out(&mut self, map: &MacMapRef, host: MacVlan) -> Result<Inactivation, DomainError> {
        let entry = self.maps.get_mut(map).ok_or_else(|| not_found(map))?;
        let mut released = BTreeSet::new();
        let mut hosts = BTreeMap::new();
        if let Some(port) = entry.state.inactivate(host, &mut released) {
            debug!(map = %map, host = %host, port = %port, "host aged out");
            hosts.insert(host, port);
        }
        self.sync(map);
        Ok(Inactivation { hosts, released })
    }

    /// Ports went down. Applies to every mapping; only mappings that lost
    /// a host are reported.
    pub fn port_down(&mut self, filter: &dyn PortFilter) -> BTreeMap<MacMapRef, Inactivation> {
        let mut report = BTreeMap::new();
        for (map, entry) in &mut self.maps {
            let mut released = BTreeSet::new();
            let hosts = entry.state.inactivate_ports(filter, &mut released);
            if !hosts.is_empty() {
                info!(map = %map, removed = hosts.len(), released = released.len(), "hosts removed by port down");
                report.insert(map.clone(), Inactivation { hosts, released });
            }
            publish_if_dirty(self.replication.as_deref(), self.metrics.as_ref(), map, &mut entry.state);
        }
        report
    }

    /// One port/VLAN network went away in every mapping.
    pub fn network_down(&mut self, network: &PortVlan) -> BTreeMap<MacMapRef, BTreeSet<MacVlan>> {
        let mut report = BTreeMap::new();
        for (map, entry) in &mut self.maps {
            if let Some(hosts) = entry.state.inactivate_network(network) {
                info!(map = %map, network = %network, removed = hosts.len(), "network down");
                report.insert(map.clone(), hosts);
            }
            publish_if_dirty(self.replication.as_deref(), self.metrics.as_ref(), map, &mut entry.state);
        }
        report
    }

    /// Copy of one mapping's state.
    pub fn snapshot(&self, map: &MacMapRef) -> Option<MacMapState> {
        self.maps.get(map).map(|entry| entry.state.clone())
    }

    pub fn settings(&self, map: &MacMapRef) -> Option<&MacMapSettings> {
        self.maps.get(map).map(|entry| &entry.settings)
    }

    pub fn maps(&self) -> impl Iterator<Item = &MacMapRef> {
        self.maps.keys()
    }

    fn sync(&mut self, map: &MacMapRef) {
        if let Some(entry) = self.maps.get_mut(map) {
            publish_if_dirty(self.replication.as_deref(), self.metrics.as_ref(), map, &mut entry.state);
        }
    }
}

/// Consume the dirty flag, publish when set and refresh the gauges.
fn publish_if_dirty(
    replication: Option<&dyn MacMapReplicationPort>,
    metrics: &dyn MetricsPort,
    map: &MacMapRef,
    state: &mut MacMapState,
) {
    if !state.take_dirty() {
        return;
    }
    let label = map.to_string();
    metrics.set_macmap_active_hosts(&label, state.host_count() as u64);
    metrics.set_macmap_networks(&label, state.network_count() as u64);

    let Some(port) = replication else {
        return;
    };
    match port.publish(map, state) {
        Ok(()) => metrics.record_macmap_replication(&label, "success"),
        Err(e) => {
            warn!(map = %map, error = %e, "failed to replicate MAC mapping state");
            metrics.record_macmap_replication(&label, "failure");
        }
    }
}

fn not_found(map: &MacMapRef) -> DomainError {
    DomainError::NotFound(format!("MAC mapping {map}"))
}
