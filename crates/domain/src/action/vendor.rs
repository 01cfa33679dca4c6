//! Conversion between flow actions and the generic southbound action set.
//!
//! The southbound set has no ICMP fields: ICMP type and code travel in the
//! transport source and destination port slots, and DSCP travels as the
//! full TOS byte.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::common::entity::{MacAddr, VlanId, ip_proto};

use super::entity::FlowAction;
use super::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorAction {
    SetDlSrc(MacAddr),
    SetDlDst(MacAddr),
    SetVlanPcp(u8),
    SetNwSrc(Ipv4Addr),
    SetNwDst(Ipv4Addr),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
    Drop,
    PopVlan,
    /// Push a tag with the given TPID.
    PushVlan(u16),
    SetVlanId(VlanId),
}

impl VendorAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetDlSrc(_) => "set-dl-src",
            Self::SetDlDst(_) => "set-dl-dst",
            Self::SetVlanPcp(_) => "set-vlan-pcp",
            Self::SetNwSrc(_) => "set-nw-src",
            Self::SetNwDst(_) => "set-nw-dst",
            Self::SetNwTos(_) => "set-nw-tos",
            Self::SetTpSrc(_) => "set-tp-src",
            Self::SetTpDst(_) => "set-tp-dst",
            Self::Drop => "drop",
            Self::PopVlan => "pop-vlan",
            Self::PushVlan(_) => "push-vlan",
            Self::SetVlanId(_) => "set-vlan-id",
        }
    }
}

impl FlowAction {
    pub fn to_vendor(&self) -> VendorAction {
        match *self {
            Self::SetDlSrc { address } => VendorAction::SetDlSrc(address.get()),
            Self::SetDlDst { address } => VendorAction::SetDlDst(address.get()),
            Self::SetVlanPcp { priority } => VendorAction::SetVlanPcp(priority.get()),
            Self::SetInet4Src { address } => VendorAction::SetNwSrc(address),
            Self::SetInet4Dst { address } => VendorAction::SetNwDst(address),
            Self::SetDscp { dscp } => VendorAction::SetNwTos(dscp.to_tos()),
            Self::SetTpSrc { port } => VendorAction::SetTpSrc(port),
            Self::SetTpDst { port } => VendorAction::SetTpDst(port),
            Self::SetIcmpType { icmp_type } => VendorAction::SetTpSrc(u16::from(icmp_type)),
            Self::SetIcmpCode { code } => VendorAction::SetTpDst(u16::from(code)),
        }
    }

    /// Convert a southbound action back. `ip_protocol` is the IP protocol
    /// the enclosing flow matches on; with ICMP the port slots are read as
    /// ICMP type and code.
    pub fn from_vendor(
        action: &VendorAction,
        ip_protocol: Option<u8>,
    ) -> Result<Self, ActionError> {
        let icmp = ip_protocol == Some(ip_proto::ICMP);
        match *action {
            VendorAction::SetDlSrc(address) => Self::set_dl_src(address),
            VendorAction::SetDlDst(address) => Self::set_dl_dst(address),
            VendorAction::SetVlanPcp(priority) => Self::set_vlan_pcp(priority),
            VendorAction::SetNwSrc(address) => Ok(Self::SetInet4Src { address }),
            VendorAction::SetNwDst(address) => Ok(Self::SetInet4Dst { address }),
            VendorAction::SetNwTos(tos) => Self::set_dscp(tos >> 2),
            VendorAction::SetTpSrc(port) if icmp => u8::try_from(port)
                .map(|icmp_type| Self::SetIcmpType { icmp_type })
                .map_err(|_| ActionError::invalid("set-icmp-type", "ICMP type", port)),
            VendorAction::SetTpDst(port) if icmp => u8::try_from(port)
                .map(|code| Self::SetIcmpCode { code })
                .map_err(|_| ActionError::invalid("set-icmp-code", "ICMP code", port)),
            VendorAction::SetTpSrc(port) => Ok(Self::SetTpSrc { port }),
            VendorAction::SetTpDst(port) => Ok(Self::SetTpDst { port }),
            VendorAction::Drop
            | VendorAction::PopVlan
            | VendorAction::PushVlan(_)
            | VendorAction::SetVlanId(_) => Err(ActionError::Unsupported(action.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dscp_travels_as_tos() {
        let action = FlowAction::set_dscp(46).unwrap();
        assert_eq!(action.to_vendor(), VendorAction::SetNwTos(184));
        assert_eq!(
            FlowAction::from_vendor(&VendorAction::SetNwTos(184), None).unwrap(),
            action
        );
    }

    #[test]
    fn icmp_uses_port_slots() {
        let set_type = FlowAction::SetIcmpType { icmp_type: 3 };
        let set_code = FlowAction::SetIcmpCode { code: 13 };
        assert_eq!(set_type.to_vendor(), VendorAction::SetTpSrc(3));
        assert_eq!(set_code.to_vendor(), VendorAction::SetTpDst(13));

        let icmp = Some(ip_proto::ICMP);
        assert_eq!(
            FlowAction::from_vendor(&set_type.to_vendor(), icmp).unwrap(),
            set_type
        );
        assert_eq!(
            FlowAction::from_vendor(&set_code.to_vendor(), icmp).unwrap(),
            set_code
        );

        // Same slot under TCP is a port rewrite.
        assert_eq!(
            FlowAction::from_vendor(&VendorAction::SetTpSrc(3), Some(ip_proto::TCP)).unwrap(),
            FlowAction::SetTpSrc { port: 3 }
        );
    }

    #[test]
    fn icmp_and_port_actions_share_vendor_form() {
        let set_type = FlowAction::SetIcmpType { icmp_type: 3 };
        let set_port = FlowAction::SetTpSrc { port: 3 };
        assert_ne!(set_type, set_port);
        assert_eq!(set_type.to_vendor(), set_port.to_vendor());

        let set_code = FlowAction::SetIcmpCode { code: 3 };
        let set_dst = FlowAction::SetTpDst { port: 3 };
        assert_ne!(set_code, set_dst);
        assert_eq!(set_code.to_vendor(), set_dst.to_vendor());

        // The enclosing protocol decides which one comes back.
        let vendor = set_type.to_vendor();
        assert_eq!(
            FlowAction::from_vendor(&vendor, Some(ip_proto::ICMP)).unwrap(),
            set_type
        );
        assert_eq!(
            FlowAction::from_vendor(&vendor, Some(ip_proto::UDP)).unwrap(),
            set_port
        );
    }

    #[test]
    fn icmp_slot_out_of_range() {
        let err = FlowAction::from_vendor(&VendorAction::SetTpDst(300), Some(ip_proto::ICMP))
            .unwrap_err();
        assert_eq!(err.to_string(), "set-icmp-code: Invalid ICMP code: 300");
    }

    #[test]
    fn every_field_action_survives_vendor_conversion() {
        let mac = MacAddr([0x00, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e]);
        let tcp = [
            FlowAction::set_dl_src(mac).unwrap(),
            FlowAction::set_dl_dst(mac).unwrap(),
            FlowAction::set_vlan_pcp(6).unwrap(),
            FlowAction::SetInet4Src {
                address: Ipv4Addr::new(10, 1, 1, 1),
            },
            FlowAction::SetInet4Dst {
                address: Ipv4Addr::new(10, 2, 2, 2),
            },
            FlowAction::set_dscp(63).unwrap(),
            FlowAction::SetTpSrc { port: 65535 },
            FlowAction::SetTpDst { port: 0 },
        ];
        for action in tcp {
            let back = FlowAction::from_vendor(&action.to_vendor(), Some(ip_proto::TCP)).unwrap();
            assert_eq!(back, action);
        }
    }

    #[test]
    fn tag_operations_are_unsupported() {
        for action in [
            VendorAction::Drop,
            VendorAction::PopVlan,
            VendorAction::PushVlan(0x8100),
            VendorAction::SetVlanId(10),
        ] {
            assert!(matches!(
                FlowAction::from_vendor(&action, None),
                Err(ActionError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn vendor_mac_still_validated() {
        assert!(FlowAction::from_vendor(&VendorAction::SetDlSrc(MacAddr::ZERO), None).is_err());
    }
}
