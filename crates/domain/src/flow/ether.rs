use serde::{Deserialize, Serialize};

use crate::common::entity::{MacAddr, VLAN_ID_MAX, VLAN_PCP_MAX, VlanId};

use super::desc::EthernetMatchDesc;
use super::error::FlowError;
use super::packet::EthernetHeader;

const LAYER: &str = "Ethernet";

/// Layer-2 match condition. Every field is optional; an absent field
/// matches any value.
///
/// Invariant: `vlan_priority` is set only together with a VLAN ID > 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EthernetMatchDesc", into = "EthernetMatchDesc")]
pub struct EthernetMatch {
    src: Option<MacAddr>,
    dst: Option<MacAddr>,
    ether_type: Option<u16>,
    vlan: Option<VlanId>,
    vlan_priority: Option<u8>,
}

impl EthernetMatch {
    pub fn new(
        src: Option<MacAddr>,
        dst: Option<MacAddr>,
        ether_type: Option<u16>,
        vlan: Option<VlanId>,
        vlan_priority: Option<u8>,
    ) -> Result<Self, FlowError> {
        if let Some(mac) = src
            && !mac.is_unicast()
        {
            return Err(FlowError::invalid(LAYER, "source MAC address", mac));
        }
        if let Some(vid) = vlan
            && vid > VLAN_ID_MAX
        {
            return Err(FlowError::invalid(LAYER, "VLAN ID", vid));
        }
        if let Some(pcp) = vlan_priority {
            if pcp > VLAN_PCP_MAX {
                return Err(FlowError::invalid(LAYER, "VLAN priority", pcp));
            }
            if vlan.is_none_or(|vid| vid == 0) {
                return Err(FlowError::PriorityWithoutVlan { priority: pcp });
            }
        }
        Ok(Self {
            src,
            dst,
            ether_type,
            vlan,
            vlan_priority,
        })
    }

    /// Build from an external descriptor.
    pub fn create(desc: &EthernetMatchDesc) -> Result<Self, FlowError> {
        let src = desc
            .src
            .as_deref()
            .map(|s| parse_mac(s, "source MAC address"))
            .transpose()?;
        let dst = desc
            .dst
            .as_deref()
            .map(|s| parse_mac(s, "destination MAC address"))
            .transpose()?;
        let ether_type = desc
            .ether_type
            .map(|v| u16::try_from(v).map_err(|_| FlowError::invalid(LAYER, "ethernet type", v)))
            .transpose()?;
        let vlan = desc
            .vlan
            .map(|v| {
                u16::try_from(v)
                    .ok()
                    .filter(|vid| *vid <= VLAN_ID_MAX)
                    .ok_or_else(|| FlowError::invalid(LAYER, "VLAN ID", v))
            })
            .transpose()?;
        let vlan_priority = desc
            .vlan_priority
            .map(|v| {
                u8::try_from(v)
                    .ok()
                    .filter(|pcp| *pcp <= VLAN_PCP_MAX)
                    .ok_or_else(|| FlowError::invalid(LAYER, "VLAN priority", v))
            })
            .transpose()?;

        Self::new(src, dst, ether_type, vlan, vlan_priority)
    }

    pub fn src(&self) -> Option<MacAddr> {
        self.src
    }

    pub fn dst(&self) -> Option<MacAddr> {
        self.dst
    }

    pub fn ether_type(&self) -> Option<u16> {
        self.ether_type
    }

    pub fn vlan(&self) -> Option<VlanId> {
        self.vlan
    }

    pub fn vlan_priority(&self) -> Option<u8> {
        self.vlan_priority
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Pin the ethernet type. Succeeds if it is unset (the value is
    /// injected) or already equal to `expected`.
    pub fn reconcile_ether_type(&mut self, expected: u16) -> Result<(), FlowError> {
        match self.ether_type {
            None => {
                self.ether_type = Some(expected);
                Ok(())
            }
            Some(current) if current == expected => Ok(()),
            Some(current) => Err(FlowError::EtherTypeConflict {
                ether_type: current,
                expected,
            }),
        }
    }

    /// Evaluate against a parsed ethernet header.
    ///
    /// An untagged frame is treated as VLAN 0 without a priority, so a
    /// priority condition never matches it.
    pub fn matches(&self, eth: &EthernetHeader) -> bool {
        if self.src.is_some_and(|mac| mac != eth.src) {
            return false;
        }
        if self.dst.is_some_and(|mac| mac != eth.dst) {
            return false;
        }
        if self.ether_type.is_some_and(|t| t != eth.ether_type) {
            return false;
        }
        if let Some(vid) = self.vlan {
            let frame_vid = eth.vlan.map_or(0, |tag| tag.vid);
            if vid != frame_vid {
                return false;
            }
        }
        if let Some(pcp) = self.vlan_priority {
            match eth.vlan {
                Some(tag) if tag.pcp == pcp => {}
                _ => return false,
            }
        }
        true
    }

    pub fn to_desc(&self) -> EthernetMatchDesc {
        EthernetMatchDesc {
            src: self.src.map(|m| m.to_string()),
            dst: self.dst.map(|m| m.to_string()),
            ether_type: self.ether_type.map(i32::from),
            vlan: self.vlan.map(i32::from),
            vlan_priority: self.vlan_priority.map(i32::from),
        }
    }
}

impl std::fmt::Display for EthernetMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(mac) = self.src {
            parts.push(format!("src={mac}"));
        }
        if let Some(mac) = self.dst {
            parts.push(format!("dst={mac}"));
        }
        if let Some(t) = self.ether_type {
            parts.push(format!("type=0x{t:04x}"));
        }
        if let Some(vid) = self.vlan {
            parts.push(format!("vlan={vid}"));
        }
        if let Some(pcp) = self.vlan_priority {
            parts.push(format!("pcp={pcp}"));
        }
        write!(f, "ether[{}]", parts.join(","))
    }
}

impl TryFrom<EthernetMatchDesc> for EthernetMatch {
    type Error = FlowError;

    fn try_from(desc: EthernetMatchDesc) -> Result<Self, Self::Error> {
        Self::create(&desc)
    }
}

impl From<EthernetMatch> for EthernetMatchDesc {
    fn from(m: EthernetMatch) -> Self {
        m.to_desc()
    }
}

fn parse_mac(s: &str, field: &'static str) -> Result<MacAddr, FlowError> {
    MacAddr::parse(s.trim()).map_err(|_| FlowError::invalid(LAYER, field, s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity::ether_type;
    use crate::flow::packet::VlanTag;

    fn mac(last: u8) -> MacAddr {
        MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, last])
    }

    fn header(vlan: Option<VlanTag>) -> EthernetHeader {
        EthernetHeader {
            src: mac(1),
            dst: mac(2),
            ether_type: ether_type::IPV4,
            vlan,
        }
    }

    fn vlan_match(vid: u16, pcp: Option<u8>) -> EthernetMatch {
        EthernetMatch::new(None, None, None, Some(vid), pcp).unwrap()
    }

    // ── Construction ──────────────────────────────────────────────

    #[test]
    fn create_reads_back_normalized_values() {
        let desc = EthernetMatchDesc {
            src: Some("00:11:22:33:44:01".to_string()),
            dst: Some("FF-FF-FF-FF-FF-FF".to_string()),
            ether_type: Some(0x0806),
            vlan: Some(4095),
            vlan_priority: Some(7),
        };
        let em = EthernetMatch::create(&desc).unwrap();
        assert_eq!(em.src(), Some(mac(1)));
        assert_eq!(em.dst(), Some(MacAddr::BROADCAST));
        assert_eq!(em.ether_type(), Some(0x0806));
        assert_eq!(em.vlan(), Some(4095));
        assert_eq!(em.vlan_priority(), Some(7));
        assert_eq!(EthernetMatch::create(&em.to_desc()).unwrap(), em);
    }

    #[test]
    fn create_rejects_bad_fields() {
        let cases = [
            EthernetMatchDesc {
                src: Some("not-a-mac".to_string()),
                ..Default::default()
            },
            EthernetMatchDesc {
                src: Some("01:00:5e:00:00:01".to_string()),
                ..Default::default()
            },
            EthernetMatchDesc {
                dst: Some("00:11:22".to_string()),
                ..Default::default()
            },
            EthernetMatchDesc {
                ether_type: Some(0x1_0000),
                ..Default::default()
            },
            EthernetMatchDesc {
                ether_type: Some(-1),
                ..Default::default()
            },
            EthernetMatchDesc {
                vlan: Some(4096),
                ..Default::default()
            },
            EthernetMatchDesc {
                vlan: Some(-1),
                ..Default::default()
            },
            EthernetMatchDesc {
                vlan: Some(1),
                vlan_priority: Some(8),
                ..Default::default()
            },
        ];
        for desc in &cases {
            assert!(EthernetMatch::create(desc).is_err(), "{desc:?} should fail");
        }
    }

    #[test]
    fn priority_requires_positive_vlan() {
        let desc = EthernetMatchDesc {
            vlan_priority: Some(3),
            ..Default::default()
        };
        assert_eq!(
            EthernetMatch::create(&desc).unwrap_err(),
            FlowError::PriorityWithoutVlan { priority: 3 }
        );

        let desc = EthernetMatchDesc {
            vlan: Some(0),
            vlan_priority: Some(3),
            ..Default::default()
        };
        assert!(EthernetMatch::create(&desc).is_err());
    }

    #[test]
    fn vlan_error_message() {
        let desc = EthernetMatchDesc {
            vlan: Some(4096),
            ..Default::default()
        };
        assert_eq!(
            EthernetMatch::create(&desc).unwrap_err().to_string(),
            "Ethernet: Invalid VLAN ID: 4096"
        );
    }

    // ── Serde ─────────────────────────────────────────────────────

    #[test]
    fn deserialize_runs_validation() {
        for json in [
            r#"{"vlan_priority":3}"#,
            r#"{"vlan":5000}"#,
            r#"{"src":"ff:ff:ff:ff:ff:ff"}"#,
        ] {
            assert!(
                serde_json::from_str::<EthernetMatch>(json).is_err(),
                "{json} should fail"
            );
        }

        let em = vlan_match(10, Some(3));
        let json = serde_json::to_string(&em).unwrap();
        assert_eq!(json, r#"{"vlan":10,"vlan_priority":3}"#);
        assert_eq!(serde_json::from_str::<EthernetMatch>(&json).unwrap(), em);
    }

    // ── Ether type pinning ────────────────────────────────────────

    #[test]
    fn reconcile_injects_when_unset() {
        let mut em = EthernetMatch::default();
        em.reconcile_ether_type(ether_type::IPV4).unwrap();
        assert_eq!(em.ether_type(), Some(ether_type::IPV4));
        // Idempotent.
        em.reconcile_ether_type(ether_type::IPV4).unwrap();
    }

    #[test]
    fn reconcile_conflict_leaves_match_untouched() {
        let mut em = EthernetMatch::new(None, None, Some(ether_type::ARP), None, None).unwrap();
        let before = em.clone();
        let err = em.reconcile_ether_type(ether_type::IPV4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ethernet type conflict: type=0x806, expected=0x800"
        );
        assert_eq!(em, before);
    }

    // ── Packet matching ───────────────────────────────────────────

    #[test]
    fn empty_match_matches_everything() {
        let em = EthernetMatch::default();
        assert!(em.is_empty());
        assert!(em.matches(&header(None)));
        assert!(em.matches(&header(Some(VlanTag { vid: 5, pcp: 1 }))));
    }

    #[test]
    fn tagged_vlan_with_priority() {
        let em = vlan_match(10, Some(3));
        assert!(em.matches(&header(Some(VlanTag { vid: 10, pcp: 3 }))));
        assert!(!em.matches(&header(None)));
        assert!(!em.matches(&header(Some(VlanTag { vid: 11, pcp: 3 }))));
        assert!(!em.matches(&header(Some(VlanTag { vid: 10, pcp: 4 }))));
    }

    #[test]
    fn vlan_zero_matches_untagged_only() {
        let em = vlan_match(0, None);
        assert!(em.matches(&header(None)));
        assert!(!em.matches(&header(Some(VlanTag { vid: 10, pcp: 0 }))));
    }

    #[test]
    fn tagged_vlan_does_not_match_untagged() {
        let em = vlan_match(10, None);
        assert!(!em.matches(&header(None)));
        assert!(em.matches(&header(Some(VlanTag { vid: 10, pcp: 6 }))));
    }

    #[test]
    fn mac_and_type_fields() {
        let em = EthernetMatch::new(Some(mac(1)), Some(mac(2)), Some(ether_type::IPV4), None, None)
            .unwrap();
        assert!(em.matches(&header(None)));

        let mut other = header(None);
        other.src = mac(9);
        assert!(!em.matches(&other));

        let mut other = header(None);
        other.dst = mac(9);
        assert!(!em.matches(&other));

        let mut other = header(None);
        other.ether_type = ether_type::ARP;
        assert!(!em.matches(&other));
    }

    #[test]
    fn display_lists_present_fields() {
        let em = EthernetMatch::new(None, Some(mac(2)), Some(0x0800), Some(10), Some(3)).unwrap();
        assert_eq!(
            em.to_string(),
            "ether[dst=00:11:22:33:44:02,type=0x0800,vlan=10,pcp=3]"
        );
    }
}
