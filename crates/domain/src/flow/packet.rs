use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::common::entity::{MacAddr, VlanId, ether_type, ip_proto};

// ── Parsed packet (evaluation input) ────────────────────────────────

/// 802.1Q tag of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanTag {
    pub vid: VlanId,
    pub pcp: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetHeader {
    pub src: MacAddr,
    pub dst: MacAddr,
    pub ether_type: u16,
    /// `None` for untagged frames.
    pub vlan: Option<VlanTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Header {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub dscp: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum L4Header {
    Tcp { src_port: u16, dst_port: u16 },
    Udp { src_port: u16, dst_port: u16 },
    Icmp { icmp_type: u8, code: u8 },
}

impl L4Header {
    /// IP protocol number this payload belongs to.
    pub fn protocol(&self) -> u8 {
        match self {
            Self::Tcp { .. } => ip_proto::TCP,
            Self::Udp { .. } => ip_proto::UDP,
            Self::Icmp { .. } => ip_proto::ICMP,
        }
    }
}

/// Packet as handed over by the packet-in parser.
///
/// Upper layers are present only when the parser could decode them; a
/// truncated or malformed payload leaves the corresponding field `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub ethernet: EthernetHeader,
    pub inet: Option<Ipv4Header>,
    pub l4: Option<L4Header>,
}

impl Packet {
    /// Untagged frame without any parsed upper layer.
    pub fn ethernet(src: MacAddr, dst: MacAddr, ether_type: u16) -> Self {
        Self {
            ethernet: EthernetHeader {
                src,
                dst,
                ether_type,
                vlan: None,
            },
            inet: None,
            l4: None,
        }
    }

    #[must_use]
    pub fn with_vlan(mut self, vid: VlanId, pcp: u8) -> Self {
        self.ethernet.vlan = Some(VlanTag { vid, pcp });
        self
    }

    /// Attach an IPv4 header and set the ethertype accordingly.
    #[must_use]
    pub fn with_ipv4(mut self, src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, dscp: u8) -> Self {
        self.ethernet.ether_type = ether_type::IPV4;
        self.inet = Some(Ipv4Header {
            src,
            dst,
            protocol,
            dscp,
        });
        self
    }

    #[must_use]
    pub fn with_l4(mut self, l4: L4Header) -> Self {
        self.l4 = Some(l4);
        self
    }

    /// IPv4 header, only if the frame actually carries IPv4.
    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        if self.ethernet.ether_type != ether_type::IPV4 {
            return None;
        }
        self.inet.as_ref()
    }

    /// Mutable IPv4 header, only if the frame actually carries IPv4.
    pub fn ipv4_mut(&mut self) -> Option<&mut Ipv4Header> {
        if self.ethernet.ether_type != ether_type::IPV4 {
            return None;
        }
        self.inet.as_mut()
    }

    /// Layer-4 payload, only if it agrees with the IPv4 protocol field.
    pub fn l4(&self) -> Option<&L4Header> {
        let proto = self.ipv4()?.protocol;
        self.l4.as_ref().filter(|h| h.protocol() == proto)
    }

    pub fn l4_mut(&mut self) -> Option<&mut L4Header> {
        let proto = self.ipv4()?.protocol;
        self.l4.as_mut().filter(|h| h.protocol() == proto)
    }

    pub fn vlan_id(&self) -> Option<VlanId> {
        self.ethernet.vlan.map(|t| t.vid)
    }
}
