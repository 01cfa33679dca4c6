//! External flow action descriptors.
//!
//! Besides the per-field rewrites this shape also carries the actions
//! that are valid in a flow entry but not handled by the per-field action
//! model (`drop` and the VLAN tag operations).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowActionDesc {
    SetDlSrc { address: String },
    SetDlDst { address: String },
    SetVlanPcp { priority: i32 },
    SetInet4Src { address: String },
    SetInet4Dst { address: String },
    SetDscp { dscp: i32 },
    SetTpSrc { port: i32 },
    SetTpDst { port: i32 },
    SetIcmpType { icmp_type: i32 },
    SetIcmpCode { code: i32 },
    Drop,
    PopVlan,
    PushVlan,
    SetVlanId { vlan: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_by_type() {
        let desc: FlowActionDesc =
            serde_json::from_str(r#"{"type":"set_tp_dst","port":8080}"#).unwrap();
        assert_eq!(desc, FlowActionDesc::SetTpDst { port: 8080 });

        let desc: FlowActionDesc = serde_json::from_str(r#"{"type":"pop_vlan"}"#).unwrap();
        assert_eq!(desc, FlowActionDesc::PopVlan);
    }
}
