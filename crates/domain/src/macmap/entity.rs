use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::common::entity::{MacAddr, VLAN_ID_MAX, VlanId};

use super::error::MacMapError;

const VLAN_BITS: u32 = 12;
const VLAN_MASK: u64 = (1 << VLAN_BITS) - 1;
const KEY_BITS: u32 = 48 + VLAN_BITS;

// ── Host key ────────────────────────────────────────────────────────

/// Host identified by MAC address and VLAN, encoded as
/// `(mac << 12) | vlan`.
///
/// The encoding orders hosts by MAC first, so every VLAN of one MAC forms a
/// contiguous key range. Serialized as the encoded integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct MacVlan(u64);

impl MacVlan {
    /// Rejects VLAN IDs above 4095.
    pub fn new(mac: MacAddr, vlan: VlanId) -> Result<Self, MacMapError> {
        if vlan > VLAN_ID_MAX {
            return Err(MacMapError::InvalidHost {
                value: format!("{mac}@{vlan}"),
                reason: VLAN_RANGE,
            });
        }
        Ok(Self::pack(mac, vlan))
    }

    /// Unchecked key. `vlan` must already be within the 12-bit range.
    pub(super) fn pack(mac: MacAddr, vlan: VlanId) -> Self {
        Self((mac.to_u64() << VLAN_BITS) | u64::from(vlan))
    }

    /// Inverse of [`MacVlan::encoded`].
    pub fn from_encoded(value: u64) -> Result<Self, MacMapError> {
        if value >> KEY_BITS != 0 {
            return Err(MacMapError::InvalidHost {
                value: format!("{value:#x}"),
                reason: "encoded host key is wider than 60 bits",
            });
        }
        Ok(Self(value))
    }

    pub fn encoded(self) -> u64 {
        self.0
    }

    pub fn mac(self) -> MacAddr {
        MacAddr::from_u64(self.0 >> VLAN_BITS)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn vlan(self) -> VlanId {
        (self.0 & VLAN_MASK) as VlanId
    }

    /// Parse `aa:bb:cc:dd:ee:ff@vlan`. A missing `@vlan` means VLAN 0.
    pub fn parse(s: &str) -> Result<Self, MacMapError> {
        let invalid = |reason| MacMapError::InvalidHost {
            value: s.to_string(),
            reason,
        };
        let (mac_text, vlan_text) = match s.trim().split_once('@') {
            Some((m, v)) => (m, Some(v)),
            None => (s.trim(), None),
        };
        let mac = MacAddr::parse(mac_text).map_err(invalid)?;
        if !mac.is_unicast() || mac.is_zero() {
            return Err(invalid("MAC address must be a non-zero unicast address"));
        }
        let vlan = match vlan_text {
            None => 0,
            Some(v) => v
                .parse::<VlanId>()
                .ok()
                .filter(|vid| *vid <= VLAN_ID_MAX)
                .ok_or_else(|| invalid(VLAN_RANGE))?,
        };
        Ok(Self::pack(mac, vlan))
    }
}

const VLAN_RANGE: &str = "VLAN ID must be in 0..=4095";

impl TryFrom<u64> for MacVlan {
    type Error = MacMapError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::from_encoded(value)
    }
}

impl From<MacVlan> for u64 {
    fn from(host: MacVlan) -> Self {
        host.encoded()
    }
}

impl std::fmt::Display for MacVlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.mac(), self.vlan())
    }
}

impl std::str::FromStr for MacVlan {
    type Err = MacMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ── Ports and networks ──────────────────────────────────────────────

/// Opaque reference to a switch port: datapath ID plus port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwitchPort {
    pub node: u64,
    pub port: u32,
}

impl SwitchPort {
    pub fn new(node: u64, port: u32) -> Self {
        Self { node, port }
    }
}

impl std::fmt::Display for SwitchPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}/{}", self.node, self.port)
    }
}

/// One VLAN on one switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortVlan {
    pub port: SwitchPort,
    pub vlan: VlanId,
}

impl PortVlan {
    pub fn new(port: SwitchPort, vlan: VlanId) -> Self {
        Self { port, vlan }
    }
}

impl std::fmt::Display for PortVlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.port, self.vlan)
    }
}

/// Names the MAC mapping configuration that owns an activation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacMapRef {
    pub tenant: String,
    pub bridge: String,
}

impl MacMapRef {
    pub fn new(tenant: impl Into<String>, bridge: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            bridge: bridge.into(),
        }
    }
}

impl std::fmt::Display for MacMapRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant, self.bridge)
    }
}

/// Membership rules of one MAC mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacMapSettings {
    pub map: MacMapRef,
    /// Hosts admitted regardless of their VLAN.
    pub allowed_hosts: BTreeSet<MacVlan>,
    /// VLANs on which any host is admitted.
    pub mapped_vlans: BTreeSet<VlanId>,
}

impl MacMapSettings {
    pub fn new(map: MacMapRef) -> Self {
        Self {
            map,
            allowed_hosts: BTreeSet::new(),
            mapped_vlans: BTreeSet::new(),
        }
    }

    pub fn admits(&self, host: MacVlan) -> bool {
        self.mapped_vlans.contains(&host.vlan()) || self.allowed_hosts.contains(&host)
    }
}

// ── Port filters ────────────────────────────────────────────────────

/// Selects switch ports for bulk inactivation.
pub trait PortFilter {
    fn accept(&self, port: &SwitchPort) -> bool;
}

impl<F> PortFilter for F
where
    F: Fn(&SwitchPort) -> bool,
{
    fn accept(&self, port: &SwitchPort) -> bool {
        self(port)
    }
}

/// Every port of one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFilter(pub u64);

impl PortFilter for NodeFilter {
    fn accept(&self, port: &SwitchPort) -> bool {
        port.node == self.0
    }
}

/// Exactly one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecificPortFilter(pub SwitchPort);

impl PortFilter for SpecificPortFilter {
    fn accept(&self, port: &SwitchPort) -> bool {
        *port == self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: MacAddr = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

    fn make_host(vlan: VlanId) -> MacVlan {
        MacVlan::new(MAC, vlan).unwrap()
    }

    // ── Host key ──────────────────────────────────────────────────

    #[test]
    fn mac_vlan_encoding() {
        let host = make_host(10);
        assert_eq!(host.encoded(), (0x0011_2233_4455 << 12) | 10);
        assert_eq!(host.mac(), MAC);
        assert_eq!(host.vlan(), 10);
        assert_eq!(MacVlan::from_encoded(host.encoded()).unwrap(), host);
    }

    #[test]
    fn new_rejects_vlan_above_12_bits() {
        for vlan in [4096, 4097, u16::MAX] {
            let err = MacVlan::new(MAC, vlan).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("invalid host '00:11:22:33:44:55@{vlan}': VLAN ID must be in 0..=4095")
            );
        }
        // 4097 must not alias VLAN 1.
        assert!(MacVlan::new(MAC, 4097).is_err());
        assert_eq!(make_host(4095).vlan(), 4095);
    }

    #[test]
    fn from_encoded_rejects_wide_values() {
        assert!(MacVlan::from_encoded(1 << 60).is_err());
        assert!(MacVlan::from_encoded(u64::MAX).is_err());
        assert_eq!(MacVlan::from_encoded((1 << 60) - 1).unwrap().vlan(), 4095);
    }

    #[test]
    fn serde_uses_encoded_key() {
        let host = make_host(10);
        let json = serde_json::to_string(&host).unwrap();
        assert_eq!(json, host.encoded().to_string());
        assert_eq!(serde_json::from_str::<MacVlan>(&json).unwrap(), host);
        assert!(serde_json::from_str::<MacVlan>(&u64::MAX.to_string()).is_err());
    }

    #[test]
    fn mac_vlan_orders_by_mac_then_vlan() {
        let other = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x56]);
        assert!(make_host(4095) < MacVlan::new(other, 0).unwrap());
        assert!(make_host(1) < make_host(2));
    }

    #[test]
    fn parse_host() {
        assert_eq!(
            "00:11:22:33:44:55@10".parse::<MacVlan>().unwrap(),
            make_host(10)
        );
        assert_eq!(MacVlan::parse("00:11:22:33:44:55").unwrap().vlan(), 0);
        assert_eq!(make_host(7).to_string(), "00:11:22:33:44:55@7");

        for bad in [
            "00:11:22:33:44@1",
            "00:11:22:33:44:55@4096",
            "00:11:22:33:44:55@x",
            "ff:ff:ff:ff:ff:ff@1",
            "00:00:00:00:00:00@1",
        ] {
            assert!(MacVlan::parse(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn filters() {
        let p = SwitchPort::new(1, 3);
        assert!(NodeFilter(1).accept(&p));
        assert!(!NodeFilter(2).accept(&p));
        assert!(SpecificPortFilter(p).accept(&p));
        assert!(!SpecificPortFilter(SwitchPort::new(1, 4)).accept(&p));

        let odd_ports = |port: &SwitchPort| port.port % 2 == 1;
        assert!(odd_ports.accept(&p));
    }

    #[test]
    fn display_forms() {
        let pv = PortVlan::new(SwitchPort::new(0xab, 2), 10);
        assert_eq!(pv.to_string(), "00000000000000ab/2@10");
        assert_eq!(MacMapRef::new("t1", "b1").to_string(), "t1/b1");
    }

    #[test]
    fn settings_admit_mapped_vlan_or_listed_host() {
        let mut settings = MacMapSettings::new(MacMapRef::new("t", "b"));
        settings.mapped_vlans.insert(10);
        settings.allowed_hosts.insert(make_host(30));

        assert!(settings.admits(make_host(10)));
        assert!(settings.admits(make_host(30)));
        assert!(!settings.admits(make_host(20)));
    }
}
