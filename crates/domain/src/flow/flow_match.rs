use serde::{Deserialize, Serialize};

use crate::common::entity::ether_type;

use super::desc::FlowMatchDesc;
use super::error::FlowError;
use super::ether::EthernetMatch;
use super::inet::InetMatch;
use super::l4::L4Match;
use super::packet::Packet;

/// Smallest valid match index. Index 0 is reserved.
pub const MATCH_INDEX_MIN: u16 = 1;

/// Composite L2/L3/L4 match identified by an index within its flow
/// condition.
///
/// Construction pins the lower layers implied by the upper ones: an L4
/// condition forces the IP protocol of the L3 match, and any L3 condition
/// forces the IPv4 ethernet type. The stored triple is always consistent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FlowMatchDesc", into = "FlowMatchDesc")]
pub struct FlowMatch {
    index: u16,
    ethernet: Option<EthernetMatch>,
    inet: Option<InetMatch>,
    l4: Option<L4Match>,
}

impl FlowMatch {
    pub fn new(
        index: u16,
        ethernet: Option<EthernetMatch>,
        mut inet: Option<InetMatch>,
        l4: Option<L4Match>,
    ) -> Result<Self, FlowError> {
        if index < MATCH_INDEX_MIN {
            return Err(FlowError::InvalidIndex {
                index: i64::from(index),
            });
        }

        if let Some(l4) = &l4 {
            l4.validate()?;
            inet.get_or_insert_with(InetMatch::default)
                .reconcile_protocol(l4.protocol())?;
        }

        let mut ethernet = ethernet;
        if inet.is_some() {
            ethernet
                .get_or_insert_with(EthernetMatch::default)
                .reconcile_ether_type(ether_type::IPV4)?;
        }

        Ok(Self {
            index,
            ethernet,
            inet,
            l4,
        })
    }

    /// Build from an external descriptor. Every layer is validated before
    /// the layers are reconciled.
    pub fn create(desc: &FlowMatchDesc) -> Result<Self, FlowError> {
        let index = match desc.index {
            None => return Err(FlowError::MissingIndex),
            Some(raw) => u16::try_from(raw)
                .ok()
                .filter(|i| *i >= MATCH_INDEX_MIN)
                .ok_or(FlowError::InvalidIndex {
                    index: i64::from(raw),
                })?,
        };
        let ethernet = desc
            .ethernet
            .as_ref()
            .map(EthernetMatch::create)
            .transpose()?;
        let inet = desc.inet.as_ref().map(InetMatch::create).transpose()?;
        let l4 = desc.l4.as_ref().map(L4Match::create).transpose()?;

        Self::new(index, ethernet, inet, l4)
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn ethernet(&self) -> Option<&EthernetMatch> {
        self.ethernet.as_ref()
    }

    pub fn inet(&self) -> Option<&InetMatch> {
        self.inet.as_ref()
    }

    pub fn l4(&self) -> Option<&L4Match> {
        self.l4.as_ref()
    }

    /// IP protocol this match requires, if any.
    pub fn ip_protocol(&self) -> Option<u8> {
        self.inet.as_ref().and_then(InetMatch::protocol)
    }

    /// True if the match imposes no condition at all.
    pub fn is_wildcard(&self) -> bool {
        self.inet.is_none()
            && self.l4.is_none()
            && self.ethernet.as_ref().is_none_or(EthernetMatch::is_empty)
    }

    /// Evaluate L2, then L3, then L4, stopping at the first mismatch.
    ///
    /// An L3 condition fails on any packet without a parsed IPv4 header;
    /// an L4 condition fails unless a payload of the required kind was
    /// parsed.
    pub fn matches(&self, packet: &Packet) -> bool {
        if let Some(eth) = &self.ethernet
            && !eth.matches(&packet.ethernet)
        {
            return false;
        }

        if let Some(inet) = &self.inet {
            match packet.ipv4() {
                Some(ip) if inet.matches(ip) => {}
                _ => return false,
            }
        }

        if let Some(l4) = &self.l4 {
            match packet.l4() {
                Some(header) if l4.matches(header) => {}
                _ => return false,
            }
        }

        true
    }

    /// Conditions only, without the index. Used in log output.
    pub fn describe(&self) -> String {
        if self.is_wildcard() {
            return "any".to_string();
        }
        let mut parts = Vec::with_capacity(3);
        if let Some(eth) = &self.ethernet {
            parts.push(eth.to_string());
        }
        if let Some(inet) = &self.inet {
            parts.push(inet.to_string());
        }
        if let Some(l4) = &self.l4 {
            parts.push(l4.to_string());
        }
        parts.join(" ")
    }

    pub fn to_desc(&self) -> FlowMatchDesc {
        FlowMatchDesc {
            index: Some(i32::from(self.index)),
            ethernet: self.ethernet.as_ref().map(EthernetMatch::to_desc),
            inet: self.inet.as_ref().map(InetMatch::to_desc),
            l4: self.l4.as_ref().map(L4Match::to_desc),
        }
    }
}

impl std::fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "match#{} {}", self.index, self.describe())
    }
}

impl TryFrom<FlowMatchDesc> for FlowMatch {
    type Error = FlowError;

    fn try_from(desc: FlowMatchDesc) -> Result<Self, Self::Error> {
        Self::create(&desc)
    }
}

impl From<FlowMatch> for FlowMatchDesc {
    fn from(fm: FlowMatch) -> Self {
        fm.to_desc()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::Ipv4Addr;

    use super::*;
    use crate::common::entity::{MacAddr, ip_proto};
    use crate::flow::desc::{
        EthernetMatchDesc, Inet4MatchDesc, InetMatchDesc, L4MatchDesc, PortRangeDesc,
    };
    use crate::flow::inet::Inet4Match;
    use crate::flow::packet::L4Header;
    use crate::flow::range::PortRange;

    fn mac(last: u8) -> MacAddr {
        MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, last])
    }

    fn tcp_packet(dst_port: u16) -> Packet {
        Packet::ethernet(mac(1), mac(2), ether_type::IPV4)
            .with_ipv4(
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 2),
                ip_proto::TCP,
                0,
            )
            .with_l4(L4Header::Tcp {
                src_port: 40000,
                dst_port,
            })
    }

    fn udp_packet(dst_port: u16) -> Packet {
        Packet::ethernet(mac(1), mac(2), ether_type::IPV4)
            .with_ipv4(
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 2),
                ip_proto::UDP,
                0,
            )
            .with_l4(L4Header::Udp {
                src_port: 40000,
                dst_port,
            })
    }

    fn tcp_dst_range(index: u16, from: u16, to: u16) -> FlowMatch {
        let l4 = L4Match::tcp(None, Some(PortRange { from, to })).unwrap();
        FlowMatch::new(index, None, None, Some(l4)).unwrap()
    }

    // ── Construction ──────────────────────────────────────────────

    #[test]
    fn l4_injects_protocol_and_ether_type() {
        let fm = tcp_dst_range(1, 1000, 2000);
        assert_eq!(fm.ip_protocol(), Some(ip_proto::TCP));
        assert_eq!(
            fm.ethernet().and_then(EthernetMatch::ether_type),
            Some(ether_type::IPV4)
        );
    }

    #[test]
    fn inet_injects_ether_type() {
        let inet = InetMatch::from(Inet4Match::new(None, None, None, Some(10)).unwrap());
        let fm = FlowMatch::new(5, None, Some(inet), None).unwrap();
        assert_eq!(
            fm.ethernet().and_then(EthernetMatch::ether_type),
            Some(ether_type::IPV4)
        );
        assert_eq!(fm.ip_protocol(), None);
    }

    #[test]
    fn tcp_with_explicit_udp_protocol_conflicts() {
        let inet = InetMatch::from(Inet4Match::new(None, None, Some(ip_proto::UDP), None).unwrap());
        let l4 = L4Match::tcp(None, None).unwrap();
        let err = FlowMatch::new(1, None, Some(inet), Some(l4)).unwrap_err();
        assert_eq!(
            err,
            FlowError::ProtocolConflict {
                protocol: ip_proto::UDP,
                expected: ip_proto::TCP,
            }
        );
    }

    #[test]
    fn explicit_non_ipv4_ether_type_conflicts() {
        let eth = EthernetMatch::new(None, None, Some(0x86dd), None, None).unwrap();
        let l4 = L4Match::udp(None, None).unwrap();
        let err = FlowMatch::new(1, Some(eth), None, Some(l4)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ethernet type conflict: type=0x86dd, expected=0x800"
        );
    }

    #[test]
    fn index_bounds() {
        assert!(matches!(
            FlowMatch::new(0, None, None, None),
            Err(FlowError::InvalidIndex { index: 0 })
        ));
        assert!(FlowMatch::new(u16::MAX, None, None, None).is_ok());

        let missing = FlowMatchDesc::default();
        assert_eq!(
            FlowMatch::create(&missing).unwrap_err().to_string(),
            "Match index cannot be null"
        );

        for bad in [0, -1, 65536] {
            let desc = FlowMatchDesc {
                index: Some(bad),
                ..Default::default()
            };
            assert_eq!(
                FlowMatch::create(&desc).unwrap_err(),
                FlowError::InvalidIndex {
                    index: i64::from(bad)
                }
            );
        }
    }

    #[test]
    fn new_rejects_inverted_literal_range() {
        let l4 = L4Match::Tcp {
            src: Some(PortRange { from: 9, to: 1 }),
            dst: None,
        };
        let err = FlowMatch::new(1, None, None, Some(l4)).unwrap_err();
        assert_eq!(
            err,
            FlowError::InvalidPortRange {
                layer: "TCP",
                field: "source port",
                from: 9,
                to: 1,
            }
        );
    }

    #[test]
    fn create_and_to_desc_preserve_equality() {
        let desc = FlowMatchDesc {
            index: Some(7),
            ethernet: Some(EthernetMatchDesc {
                src: Some("00:11:22:33:44:55".to_string()),
                vlan: Some(10),
                vlan_priority: Some(3),
                ..Default::default()
            }),
            inet: Some(InetMatchDesc::Inet4(Inet4MatchDesc {
                dst: Some("192.168.10.77".to_string()),
                dst_suffix: Some(24),
                ..Default::default()
            })),
            l4: Some(L4MatchDesc::Udp {
                src: None,
                dst: Some(PortRangeDesc::single(53)),
            }),
        };
        let fm = FlowMatch::create(&desc).unwrap();
        let again = FlowMatch::create(&fm.to_desc()).unwrap();
        assert_eq!(fm, again);

        let mut set = HashSet::new();
        set.insert(fm.clone());
        assert!(set.contains(&again));
    }

    #[test]
    fn equality_includes_index() {
        assert_ne!(tcp_dst_range(1, 80, 80), tcp_dst_range(2, 80, 80));
        assert_eq!(tcp_dst_range(1, 80, 80), tcp_dst_range(1, 80, 80));
    }

    // ── Serde ─────────────────────────────────────────────────────

    #[test]
    fn deserialize_rejects_each_invalid_layer() {
        let cases = [
            (r#"{"index":0}"#, "Invalid match index: 0"),
            ("{}", "Match index cannot be null"),
            (
                r#"{"index":1,"ethernet":{"ether_type":34525},"l4":{"protocol":"tcp"}}"#,
                "Ethernet type conflict",
            ),
            (
                r#"{"index":1,"ethernet":{"vlan_priority":5}}"#,
                "VLAN priority requires a valid VLAN ID",
            ),
            (
                r#"{"index":1,"inet":{"family":"inet4","dscp":200}}"#,
                "Inet4: Invalid DSCP: 200",
            ),
            (
                r#"{"index":1,"l4":{"protocol":"tcp","src":{"from":9,"to":1}}}"#,
                "TCP: Invalid source port range: from=9, to=1",
            ),
        ];
        for (json, message) in cases {
            let err = serde_json::from_str::<FlowMatch>(json).unwrap_err();
            assert!(
                err.to_string().contains(message),
                "{json}: unexpected error {err}"
            );
        }
    }

    #[test]
    fn deserialize_reconciles_layers() {
        let fm: FlowMatch =
            serde_json::from_str(r#"{"index":4,"l4":{"protocol":"udp","dst":{"from":53}}}"#)
                .unwrap();
        assert_eq!(fm.ip_protocol(), Some(ip_proto::UDP));
        assert_eq!(
            fm.ethernet().and_then(EthernetMatch::ether_type),
            Some(ether_type::IPV4)
        );

        let json = serde_json::to_string(&fm).unwrap();
        assert_eq!(serde_json::from_str::<FlowMatch>(&json).unwrap(), fm);
    }

    // ── Packet evaluation ─────────────────────────────────────────

    #[test]
    fn tcp_port_range_scenario() {
        let fm = tcp_dst_range(1, 1000, 2000);
        assert!(fm.matches(&tcp_packet(1500)));
        assert!(!fm.matches(&udp_packet(1500)));
        assert!(!fm.matches(&tcp_packet(999)));
    }

    #[test]
    fn l3_condition_fails_on_non_ipv4() {
        let inet = InetMatch::from(Inet4Match::default());
        let fm = FlowMatch::new(1, None, Some(inet), None).unwrap();
        let arp = Packet::ethernet(mac(1), MacAddr::BROADCAST, ether_type::ARP);
        assert!(!fm.matches(&arp));
        assert!(fm.matches(&tcp_packet(1)));
    }

    #[test]
    fn l4_condition_requires_parsed_payload() {
        let fm = tcp_dst_range(1, 0, u16::MAX);
        let mut truncated = tcp_packet(80);
        truncated.l4 = None;
        assert!(!fm.matches(&truncated));
    }

    #[test]
    fn wildcard_matches_everything() {
        let fm = FlowMatch::new(1, None, None, None).unwrap();
        assert!(fm.is_wildcard());
        assert_eq!(fm.describe(), "any");
        assert!(fm.matches(&Packet::ethernet(mac(1), mac(2), ether_type::ARP)));
        assert!(fm.matches(&tcp_packet(1)));
        assert!(!tcp_dst_range(1, 1, 2).is_wildcard());
    }

    #[test]
    fn display_carries_index_and_layers() {
        let fm = tcp_dst_range(3, 80, 443);
        assert_eq!(
            fm.to_string(),
            "match#3 ether[type=0x0800] inet4[proto=6] tcp[dst=80-443]"
        );
    }
}
