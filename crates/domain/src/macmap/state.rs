use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::common::entity::{VLAN_ID_MAX, VlanId};

use super::entity::{MacMapRef, MacVlan, PortFilter, PortVlan, SwitchPort};
use super::error::MacMapError;

/// Outcome of [`MacMapState::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The host was already bound to the requested port.
    Unchanged,
    /// The host was bound to `old` and now sits on the requested port.
    Moved { old: SwitchPort },
    /// The host was bound for the first time. `first` is true when it is
    /// the only active host of the state.
    Activated { first: bool },
}

/// Runtime state of one MAC mapping: which hosts are active on which
/// port, and how many hosts keep each port/VLAN network alive.
///
/// Invariants:
/// - every active host contributes exactly one reference to the network
///   `(port, host.vlan)`;
/// - a network is present iff its reference count is non-zero;
/// - a MAC address is active on at most one VLAN.
///
/// Not synchronized. The owner serializes mutating calls and reads the
/// dirty flag with [`take_dirty`](Self::take_dirty) inside the same
/// exclusive borrow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacMapState {
    active: BTreeMap<MacVlan, SwitchPort>,
    networks: BTreeMap<PortVlan, u32>,
    dirty: bool,
}

impl MacMapState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `host` to `port` on behalf of mapping `map`.
    ///
    /// Fails without touching the state if the host's MAC address is
    /// already active on another VLAN.
    pub fn activate(
        &mut self,
        map: &MacMapRef,
        host: MacVlan,
        port: SwitchPort,
    ) -> Result<Activation, MacMapError> {
        if let Some(current) = self.active.get(&host).copied() {
            if current == port {
                return Ok(Activation::Unchanged);
            }
            self.release(PortVlan::new(current, host.vlan()), None);
            self.acquire(PortVlan::new(port, host.vlan()));
            self.active.insert(host, port);
            self.dirty = true;
            return Ok(Activation::Moved { old: current });
        }

        if let Some((existing, existing_port)) = self.duplicate(host) {
            return Err(MacMapError::Duplicate {
                map: map.clone(),
                host,
                existing,
                port: existing_port,
            });
        }

        let first = self.active.is_empty();
        self.active.insert(host, port);
        self.acquire(PortVlan::new(port, host.vlan()));
        self.dirty = true;
        Ok(Activation::Activated { first })
    }

    /// Unbind one host. Networks left without hosts are added to
    /// `released`. Returns the port the host was bound to.
    pub fn inactivate(
        &mut self,
        host: MacVlan,
        released: &mut BTreeSet<PortVlan>,
    ) -> Option<SwitchPort> {
        let port = self.active.remove(&host)?;
        self.release(PortVlan::new(port, host.vlan()), Some(&mut *released));
        self.dirty = true;
        Some(port)
    }

    /// Unbind every host on one network. Returns `None` if the network
    /// had no host.
    pub fn inactivate_network(&mut self, network: &PortVlan) -> Option<BTreeSet<MacVlan>> {
        self.networks.remove(network)?;
        let hosts: BTreeSet<MacVlan> = self
            .active
            .iter()
            .filter(|(host, port)| host.vlan() == network.vlan && **port == network.port)
            .map(|(host, _)| *host)
            .collect();
        for host in &hosts {
            self.active.remove(host);
        }
        self.dirty = true;
        Some(hosts)
    }

    /// Unbind every host whose port is accepted by `filter`.
    pub fn inactivate_ports(
        &mut self,
        filter: &dyn PortFilter,
        released: &mut BTreeSet<PortVlan>,
    ) -> BTreeMap<MacVlan, SwitchPort> {
        self.remove_where(|_, port| filter.accept(port), released)
    }

    /// Unbind every host whose VLAN is in `unmapped` and that is not
    /// listed in `allowed`. Used after the VLAN set of mapping `map`
    /// changed.
    pub fn inactivate_unmapped(
        &mut self,
        map: &MacMapRef,
        allowed: &BTreeSet<MacVlan>,
        unmapped: &BTreeSet<VlanId>,
        released: &mut BTreeSet<PortVlan>,
    ) -> BTreeMap<MacVlan, SwitchPort> {
        if unmapped.is_empty() {
            return BTreeMap::new();
        }
        let removed = self.remove_where(
            |host, _| unmapped.contains(&host.vlan()) && !allowed.contains(host),
            released,
        );
        debug!(
            map = %map,
            removed = removed.len(),
            released = released.len(),
            "unmapped VLAN hosts inactivated"
        );
        removed
    }

    /// Networks with at least one active host.
    pub fn networks(&self) -> Option<BTreeSet<PortVlan>> {
        if self.networks.is_empty() {
            return None;
        }
        Some(self.networks.keys().copied().collect())
    }

    pub fn active_hosts(&self) -> Option<BTreeMap<MacVlan, SwitchPort>> {
        if self.active.is_empty() {
            return None;
        }
        Some(self.active.clone())
    }

    pub fn has_mapping(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn has_network(&self, network: &PortVlan) -> bool {
        self.networks.contains_key(network)
    }

    pub fn port(&self, host: &MacVlan) -> Option<SwitchPort> {
        self.active.get(host).copied()
    }

    pub fn host_count(&self) -> usize {
        self.active.len()
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Return and clear the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Active host with the same MAC address as `host`, on any VLAN.
    fn duplicate(&self, host: MacVlan) -> Option<(MacVlan, SwitchPort)> {
        let mac = host.mac();
        self.active
            .range(MacVlan::pack(mac, 0)..=MacVlan::pack(mac, VLAN_ID_MAX))
            .find(|(other, _)| **other != host)
            .map(|(other, port)| (*other, *port))
    }

    fn remove_where(
        &mut self,
        mut pred: impl FnMut(&MacVlan, &SwitchPort) -> bool,
        released: &mut BTreeSet<PortVlan>,
    ) -> BTreeMap<MacVlan, SwitchPort> {
        let removed: BTreeMap<MacVlan, SwitchPort> = self
            .active
            .iter()
            .filter(|&(host, port)| pred(host, port))
            .map(|(host, port)| (*host, *port))
            .collect();
        for (host, port) in &removed {
            self.active.remove(host);
            self.release(PortVlan::new(*port, host.vlan()), Some(&mut *released));
        }
        if !removed.is_empty() {
            self.dirty = true;
        }
        removed
    }

    fn acquire(&mut self, network: PortVlan) {
        *self.networks.entry(network).or_insert(0) += 1;
    }

    fn release(&mut self, network: PortVlan, released: Option<&mut BTreeSet<PortVlan>>) {
        let Some(count) = self.networks.get_mut(&network) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.networks.remove(&network);
            if let Some(out) = released {
                out.insert(network);
            }
        }
    }
}
