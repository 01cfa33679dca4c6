use serde::{Deserialize, Serialize};

use crate::common::entity::ip_proto;

use super::desc::{L4MatchDesc, PortRangeDesc};
use super::error::FlowError;
use super::packet::L4Header;
use super::range::PortRange;

/// Layer-4 match condition. The variant fixes the IP protocol the
/// enclosing flow match requires.
///
/// The variant fields are public, so code that builds a variant directly
/// must pass it through [`L4Match::validate`] (as [`FlowMatch::new`]
/// does) before relying on its ranges.
///
/// [`FlowMatch::new`]: super::flow_match::FlowMatch::new
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "L4MatchDesc", into = "L4MatchDesc")]
pub enum L4Match {
    Tcp {
        src: Option<PortRange>,
        dst: Option<PortRange>,
    },
    Udp {
        src: Option<PortRange>,
        dst: Option<PortRange>,
    },
    Icmp {
        icmp_type: Option<u8>,
        code: Option<u8>,
    },
}

impl L4Match {
    pub fn tcp(src: Option<PortRange>, dst: Option<PortRange>) -> Result<Self, FlowError> {
        let m = Self::Tcp { src, dst };
        m.validate()?;
        Ok(m)
    }

    pub fn udp(src: Option<PortRange>, dst: Option<PortRange>) -> Result<Self, FlowError> {
        let m = Self::Udp { src, dst };
        m.validate()?;
        Ok(m)
    }

    pub fn icmp(icmp_type: Option<u8>, code: Option<u8>) -> Self {
        Self::Icmp { icmp_type, code }
    }

    /// Dispatch on the descriptor protocol.
    pub fn create(desc: &L4MatchDesc) -> Result<Self, FlowError> {
        match desc {
            L4MatchDesc::Tcp { src, dst } => Ok(Self::Tcp {
                src: port_range("TCP", "source port", src.as_ref())?,
                dst: port_range("TCP", "destination port", dst.as_ref())?,
            }),
            L4MatchDesc::Udp { src, dst } => Ok(Self::Udp {
                src: port_range("UDP", "source port", src.as_ref())?,
                dst: port_range("UDP", "destination port", dst.as_ref())?,
            }),
            L4MatchDesc::Icmp { icmp_type, code } => Ok(Self::Icmp {
                icmp_type: icmp_value("type", *icmp_type)?,
                code: icmp_value("code", *code)?,
            }),
            L4MatchDesc::Sctp { .. } => Err(FlowError::Unsupported {
                what: "L4 match: SCTP".to_string(),
            }),
        }
    }

    /// Reject inverted port ranges.
    pub fn validate(&self) -> Result<(), FlowError> {
        match self {
            Self::Tcp { src, dst } => {
                check_range("TCP", "source port", *src)?;
                check_range("TCP", "destination port", *dst)
            }
            Self::Udp { src, dst } => {
                check_range("UDP", "source port", *src)?;
                check_range("UDP", "destination port", *dst)
            }
            Self::Icmp { .. } => Ok(()),
        }
    }

    /// IP protocol number implied by the variant.
    pub fn protocol(&self) -> u8 {
        match self {
            Self::Tcp { .. } => ip_proto::TCP,
            Self::Udp { .. } => ip_proto::UDP,
            Self::Icmp { .. } => ip_proto::ICMP,
        }
    }

    /// Evaluate against a parsed payload. A payload of a different kind
    /// never matches.
    pub fn matches(&self, l4: &L4Header) -> bool {
        match (self, l4) {
            (
                Self::Tcp { src, dst },
                L4Header::Tcp {
                    src_port, dst_port, ..
                },
            )
            | (
                Self::Udp { src, dst },
                L4Header::Udp {
                    src_port, dst_port, ..
                },
            ) => {
                src.is_none_or(|r| r.contains(*src_port))
                    && dst.is_none_or(|r| r.contains(*dst_port))
            }
            (
                Self::Icmp { icmp_type, code },
                L4Header::Icmp {
                    icmp_type: pkt_type,
                    code: pkt_code,
                },
            ) => icmp_type.is_none_or(|t| t == *pkt_type) && code.is_none_or(|c| c == *pkt_code),
            _ => false,
        }
    }

    pub fn to_desc(&self) -> L4MatchDesc {
        match self {
            Self::Tcp { src, dst } => L4MatchDesc::Tcp {
                src: src.map(|r| r.to_desc()),
                dst: dst.map(|r| r.to_desc()),
            },
            Self::Udp { src, dst } => L4MatchDesc::Udp {
                src: src.map(|r| r.to_desc()),
                dst: dst.map(|r| r.to_desc()),
            },
            Self::Icmp { icmp_type, code } => L4MatchDesc::Icmp {
                icmp_type: icmp_type.map(i32::from),
                code: code.map(i32::from),
            },
        }
    }
}

impl std::fmt::Display for L4Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, first, second) = match self {
            Self::Tcp { src, dst } => ("tcp", fmt_port("src", *src), fmt_port("dst", *dst)),
            Self::Udp { src, dst } => ("udp", fmt_port("src", *src), fmt_port("dst", *dst)),
            Self::Icmp { icmp_type, code } => (
                "icmp",
                icmp_type.map(|t| format!("type={t}")),
                code.map(|c| format!("code={c}")),
            ),
        };
        let parts: Vec<String> = first.into_iter().chain(second).collect();
        write!(f, "{name}[{}]", parts.join(","))
    }
}

impl TryFrom<L4MatchDesc> for L4Match {
    type Error = FlowError;

    fn try_from(desc: L4MatchDesc) -> Result<Self, Self::Error> {
        Self::create(&desc)
    }
}

impl From<L4Match> for L4MatchDesc {
    fn from(m: L4Match) -> Self {
        m.to_desc()
    }
}

fn fmt_port(name: &str, range: Option<PortRange>) -> Option<String> {
    range.map(|r| format!("{name}={r}"))
}

fn check_range(
    layer: &'static str,
    field: &'static str,
    range: Option<PortRange>,
) -> Result<(), FlowError> {
    match range {
        Some(r) if r.from > r.to => Err(FlowError::InvalidPortRange {
            layer,
            field,
            from: i32::from(r.from),
            to: i32::from(r.to),
        }),
        _ => Ok(()),
    }
}

fn port_range(
    layer: &'static str,
    field: &'static str,
    desc: Option<&PortRangeDesc>,
) -> Result<Option<PortRange>, FlowError> {
    desc.map(|d| PortRange::from_desc(layer, field, d))
        .transpose()
}

fn icmp_value(field: &'static str, value: Option<i32>) -> Result<Option<u8>, FlowError> {
    value
        .map(|v| u8::try_from(v).map_err(|_| FlowError::invalid("ICMP", field, v)))
        .transpose()
}
