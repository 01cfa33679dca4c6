use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::common::entity::MacAddr;
use crate::flow::packet::L4Header;

use super::context::PacketContext;
use super::desc::FlowActionDesc;
use super::error::ActionError;
use super::value::{Dscp, UnicastMac, VlanPcp};

/// Single header-field rewrite applied to a packet or installed in a flow
/// entry. Equality is by variant and value.
///
/// Serialized as a [`FlowActionDesc`]; deserialization goes through
/// [`FlowAction::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FlowActionDesc", into = "FlowActionDesc")]
pub enum FlowAction {
    SetDlSrc { address: UnicastMac },
    SetDlDst { address: UnicastMac },
    SetVlanPcp { priority: VlanPcp },
    SetInet4Src { address: Ipv4Addr },
    SetInet4Dst { address: Ipv4Addr },
    SetDscp { dscp: Dscp },
    SetTpSrc { port: u16 },
    SetTpDst { port: u16 },
    SetIcmpType { icmp_type: u8 },
    SetIcmpCode { code: u8 },
}

impl FlowAction {
    pub fn set_dl_src(address: MacAddr) -> Result<Self, ActionError> {
        let address = unicast("set-dl-src", address)?;
        Ok(Self::SetDlSrc { address })
    }

    pub fn set_dl_dst(address: MacAddr) -> Result<Self, ActionError> {
        let address = unicast("set-dl-dst", address)?;
        Ok(Self::SetDlDst { address })
    }

    pub fn set_vlan_pcp(priority: u8) -> Result<Self, ActionError> {
        let priority = VlanPcp::new(priority)
            .ok_or_else(|| ActionError::invalid("set-vlan-pcp", "VLAN priority", priority))?;
        Ok(Self::SetVlanPcp { priority })
    }

    pub fn set_dscp(dscp: u8) -> Result<Self, ActionError> {
        let dscp = Dscp::new(dscp).ok_or_else(|| ActionError::invalid("set-dscp", "DSCP", dscp))?;
        Ok(Self::SetDscp { dscp })
    }

    /// Build from an external descriptor.
    pub fn create(desc: &FlowActionDesc) -> Result<Self, ActionError> {
        match desc {
            FlowActionDesc::SetDlSrc { address } => {
                Self::set_dl_src(parse_mac("set-dl-src", address)?)
            }
            FlowActionDesc::SetDlDst { address } => {
                Self::set_dl_dst(parse_mac("set-dl-dst", address)?)
            }
            FlowActionDesc::SetVlanPcp { priority } => {
                let p = narrow("set-vlan-pcp", "VLAN priority", *priority)?;
                Self::set_vlan_pcp(p)
            }
            FlowActionDesc::SetInet4Src { address } => Ok(Self::SetInet4Src {
                address: parse_ipv4("set-inet4-src", address)?,
            }),
            FlowActionDesc::SetInet4Dst { address } => Ok(Self::SetInet4Dst {
                address: parse_ipv4("set-inet4-dst", address)?,
            }),
            FlowActionDesc::SetDscp { dscp } => Self::set_dscp(narrow("set-dscp", "DSCP", *dscp)?),
            FlowActionDesc::SetTpSrc { port } => Ok(Self::SetTpSrc {
                port: narrow("set-tp-src", "port", *port)?,
            }),
            FlowActionDesc::SetTpDst { port } => Ok(Self::SetTpDst {
                port: narrow("set-tp-dst", "port", *port)?,
            }),
            FlowActionDesc::SetIcmpType { icmp_type } => Ok(Self::SetIcmpType {
                icmp_type: narrow("set-icmp-type", "ICMP type", *icmp_type)?,
            }),
            FlowActionDesc::SetIcmpCode { code } => Ok(Self::SetIcmpCode {
                code: narrow("set-icmp-code", "ICMP code", *code)?,
            }),
            FlowActionDesc::Drop => Err(ActionError::Unsupported("drop")),
            FlowActionDesc::PopVlan => Err(ActionError::Unsupported("pop-vlan")),
            FlowActionDesc::PushVlan => Err(ActionError::Unsupported("push-vlan")),
            FlowActionDesc::SetVlanId { .. } => Err(ActionError::Unsupported("set-vlan-id")),
        }
    }

    pub fn to_desc(&self) -> FlowActionDesc {
        match *self {
            Self::SetDlSrc { address } => FlowActionDesc::SetDlSrc {
                address: address.to_string(),
            },
            Self::SetDlDst { address } => FlowActionDesc::SetDlDst {
                address: address.to_string(),
            },
            Self::SetVlanPcp { priority } => FlowActionDesc::SetVlanPcp {
                priority: i32::from(priority.get()),
            },
            Self::SetInet4Src { address } => FlowActionDesc::SetInet4Src {
                address: address.to_string(),
            },
            Self::SetInet4Dst { address } => FlowActionDesc::SetInet4Dst {
                address: address.to_string(),
            },
            Self::SetDscp { dscp } => FlowActionDesc::SetDscp {
                dscp: i32::from(dscp.get()),
            },
            Self::SetTpSrc { port } => FlowActionDesc::SetTpSrc {
                port: i32::from(port),
            },
            Self::SetTpDst { port } => FlowActionDesc::SetTpDst {
                port: i32::from(port),
            },
            Self::SetIcmpType { icmp_type } => FlowActionDesc::SetIcmpType {
                icmp_type: i32::from(icmp_type),
            },
            Self::SetIcmpCode { code } => FlowActionDesc::SetIcmpCode {
                code: i32::from(code),
            },
        }
    }

    /// Short, stable action name. Used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetDlSrc { .. } => "set_dl_src",
            Self::SetDlDst { .. } => "set_dl_dst",
            Self::SetVlanPcp { .. } => "set_vlan_pcp",
            Self::SetInet4Src { .. } => "set_inet4_src",
            Self::SetInet4Dst { .. } => "set_inet4_dst",
            Self::SetDscp { .. } => "set_dscp",
            Self::SetTpSrc { .. } => "set_tp_src",
            Self::SetTpDst { .. } => "set_tp_dst",
            Self::SetIcmpType { .. } => "set_icmp_type",
            Self::SetIcmpCode { .. } => "set_icmp_code",
        }
    }

    /// Rewrite the packet held by `ctx` if it carries the header this
    /// action targets. Returns `false` and leaves the packet untouched
    /// otherwise. Applied actions are appended to the context log.
    pub fn apply(&self, ctx: &mut PacketContext) -> bool {
        let packet = ctx.packet_mut();
        let applied = match *self {
            Self::SetDlSrc { address } => {
                packet.ethernet.src = address.get();
                true
            }
            Self::SetDlDst { address } => {
                packet.ethernet.dst = address.get();
                true
            }
            Self::SetVlanPcp { priority } => match packet.ethernet.vlan.as_mut() {
                Some(tag) => {
                    tag.pcp = priority.get();
                    true
                }
                None => false,
            },
            Self::SetInet4Src { address } => match packet.ipv4_mut() {
                Some(ip) => {
                    ip.src = address;
                    true
                }
                None => false,
            },
            Self::SetInet4Dst { address } => match packet.ipv4_mut() {
                Some(ip) => {
                    ip.dst = address;
                    true
                }
                None => false,
            },
            Self::SetDscp { dscp } => match packet.ipv4_mut() {
                Some(ip) => {
                    ip.dscp = dscp.get();
                    true
                }
                None => false,
            },
            Self::SetTpSrc { port } => match packet.l4_mut() {
                Some(L4Header::Tcp { src_port, .. } | L4Header::Udp { src_port, .. }) => {
                    *src_port = port;
                    true
                }
                _ => false,
            },
            Self::SetTpDst { port } => match packet.l4_mut() {
                Some(L4Header::Tcp { dst_port, .. } | L4Header::Udp { dst_port, .. }) => {
                    *dst_port = port;
                    true
                }
                _ => false,
            },
            Self::SetIcmpType { icmp_type } => match packet.l4_mut() {
                Some(L4Header::Icmp { icmp_type: t, .. }) => {
                    *t = icmp_type;
                    true
                }
                _ => false,
            },
            Self::SetIcmpCode { code } => match packet.l4_mut() {
                Some(L4Header::Icmp { code: c, .. }) => {
                    *c = code;
                    true
                }
                _ => false,
            },
        };
        if applied {
            ctx.record(*self);
        }
        applied
    }
}

impl std::fmt::Display for FlowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetDlSrc { address } | Self::SetDlDst { address } => {
                write!(f, "{}={address}", self.kind())
            }
            Self::SetInet4Src { address } | Self::SetInet4Dst { address } => {
                write!(f, "{}={address}", self.kind())
            }
            Self::SetVlanPcp { priority } => write!(f, "{}={priority}", self.kind()),
            Self::SetDscp { dscp } => write!(f, "{}={dscp}", self.kind()),
            Self::SetIcmpType { icmp_type: v } | Self::SetIcmpCode { code: v } => {
                write!(f, "{}={v}", self.kind())
            }
            Self::SetTpSrc { port } | Self::SetTpDst { port } => {
                write!(f, "{}={port}", self.kind())
            }
        }
    }
}

impl TryFrom<FlowActionDesc> for FlowAction {
    type Error = ActionError;

    fn try_from(desc: FlowActionDesc) -> Result<Self, Self::Error> {
        Self::create(&desc)
    }
}

impl From<FlowAction> for FlowActionDesc {
    fn from(action: FlowAction) -> Self {
        action.to_desc()
    }
}

/// Ordered list of flow actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowActionList(Vec<FlowAction>);

impl FlowActionList {
    pub fn new(actions: Vec<FlowAction>) -> Self {
        Self(actions)
    }

    pub fn create(descs: &[FlowActionDesc]) -> Result<Self, ActionError> {
        descs
            .iter()
            .map(FlowAction::create)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn push(&mut self, action: FlowAction) {
        self.0.push(action);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FlowAction> {
        self.0.iter()
    }

    /// Apply every action in order. Returns how many were applied.
    pub fn apply_all(&self, ctx: &mut PacketContext) -> usize {
        self.0.iter().filter(|a| a.apply(ctx)).count()
    }

    pub fn to_desc(&self) -> Vec<FlowActionDesc> {
        self.0.iter().map(FlowAction::to_desc).collect()
    }
}

impl From<Vec<FlowAction>> for FlowActionList {
    fn from(actions: Vec<FlowAction>) -> Self {
        Self(actions)
    }
}

impl<'a> IntoIterator for &'a FlowActionList {
    type Item = &'a FlowAction;
    type IntoIter = std::slice::Iter<'a, FlowAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn unicast(action: &'static str, address: MacAddr) -> Result<UnicastMac, ActionError> {
    UnicastMac::new(address).ok_or_else(|| ActionError::invalid(action, "MAC address", address))
}

fn parse_mac(action: &'static str, text: &str) -> Result<MacAddr, ActionError> {
    MacAddr::parse(text.trim()).map_err(|_| ActionError::invalid(action, "MAC address", text))
}

fn parse_ipv4(action: &'static str, text: &str) -> Result<Ipv4Addr, ActionError> {
    text.trim()
        .parse()
        .map_err(|_| ActionError::invalid(action, "IPv4 address", text))
}

fn narrow<T: TryFrom<i32>>(
    action: &'static str,
    field: &'static str,
    value: i32,
) -> Result<T, ActionError> {
    T::try_from(value).map_err(|_| ActionError::invalid(action, field, value))
}
