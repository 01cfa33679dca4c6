//! External match descriptors.
//!
//! These are the shapes carried by user configuration and by the
//! persistence layer. Scalars are deliberately wider than the protocol
//! fields they describe so that out-of-range input survives decoding and
//! is rejected by the domain constructors with a descriptive error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EthernetMatchDesc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ether_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_priority: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inet4MatchDesc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_suffix: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_suffix: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dscp: Option<i32>,
}

/// Layer-3 match descriptor. Only IPv4 is handled by the match model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum InetMatchDesc {
    Inet4(Inet4MatchDesc),
    Inet6 {
        #[serde(default)]
        src: Option<String>,
        #[serde(default)]
        dst: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortRangeDesc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<i32>,
}

impl PortRangeDesc {
    pub fn single(port: i32) -> Self {
        Self {
            from: Some(port),
            to: None,
        }
    }

    pub fn range(from: i32, to: i32) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }
}

/// Layer-4 match descriptor, selected by IP protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum L4MatchDesc {
    Tcp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<PortRangeDesc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dst: Option<PortRangeDesc>,
    },
    Udp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<PortRangeDesc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dst: Option<PortRangeDesc>,
    },
    Icmp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icmp_type: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
    },
    Sctp {
        #[serde(default)]
        src: Option<PortRangeDesc>,
        #[serde(default)]
        dst: Option<PortRangeDesc>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowMatchDesc {
    pub index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<EthernetMatchDesc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inet: Option<InetMatchDesc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l4: Option<L4MatchDesc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConditionDesc {
    pub name: String,
    #[serde(default)]
    pub matches: Vec<FlowMatchDesc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l4_desc_is_tagged_by_protocol() {
        let desc: L4MatchDesc =
            serde_json::from_str(r#"{"protocol":"tcp","dst":{"from":80,"to":443}}"#).unwrap();
        assert_eq!(
            desc,
            L4MatchDesc::Tcp {
                src: None,
                dst: Some(PortRangeDesc::range(80, 443)),
            }
        );
    }

    #[test]
    fn inet_desc_is_tagged_by_family() {
        let desc: InetMatchDesc =
            serde_json::from_str(r#"{"family":"inet4","src":"10.0.0.0","src_suffix":8}"#)
                .unwrap();
        let InetMatchDesc::Inet4(inner) = desc else {
            panic!("expected inet4");
        };
        assert_eq!(inner.src.as_deref(), Some("10.0.0.0"));
        assert_eq!(inner.src_suffix, Some(8));
    }

    #[test]
    fn out_of_range_values_survive_decoding() {
        let desc: EthernetMatchDesc =
            serde_json::from_str(r#"{"vlan":70000,"vlan_priority":-1}"#).unwrap();
        assert_eq!(desc.vlan, Some(70000));
        assert_eq!(desc.vlan_priority, Some(-1));
    }
}
