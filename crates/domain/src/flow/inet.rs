use serde::{Deserialize, Serialize};

use crate::common::entity::DSCP_MAX;

use super::desc::{Inet4MatchDesc, InetMatchDesc};
use super::error::FlowError;
use super::network::Ipv4Network;
use super::packet::Ipv4Header;

const LAYER: &str = "Inet4";

/// IPv4 header match condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Inet4MatchDesc", into = "Inet4MatchDesc")]
pub struct Inet4Match {
    src: Option<Ipv4Network>,
    dst: Option<Ipv4Network>,
    protocol: Option<u8>,
    dscp: Option<u8>,
}

impl Inet4Match {
    pub fn new(
        src: Option<Ipv4Network>,
        dst: Option<Ipv4Network>,
        protocol: Option<u8>,
        dscp: Option<u8>,
    ) -> Result<Self, FlowError> {
        if let Some(d) = dscp
            && d > DSCP_MAX
        {
            return Err(FlowError::invalid(LAYER, "DSCP", d));
        }
        Ok(Self {
            src,
            dst,
            protocol,
            dscp,
        })
    }

    pub fn create(desc: &Inet4MatchDesc) -> Result<Self, FlowError> {
        let src = Ipv4Network::from_desc("source address", desc.src.as_deref(), desc.src_suffix)?;
        let dst =
            Ipv4Network::from_desc("destination address", desc.dst.as_deref(), desc.dst_suffix)?;
        let protocol = desc
            .protocol
            .map(|p| u8::try_from(p).map_err(|_| FlowError::invalid(LAYER, "IP protocol", p)))
            .transpose()?;
        let dscp = desc
            .dscp
            .map(|d| {
                u8::try_from(d)
                    .ok()
                    .filter(|v| *v <= DSCP_MAX)
                    .ok_or_else(|| FlowError::invalid(LAYER, "DSCP", d))
            })
            .transpose()?;
        Self::new(src, dst, protocol, dscp)
    }

    pub fn src(&self) -> Option<Ipv4Network> {
        self.src
    }

    pub fn dst(&self) -> Option<Ipv4Network> {
        self.dst
    }

    pub fn protocol(&self) -> Option<u8> {
        self.protocol
    }

    pub fn dscp(&self) -> Option<u8> {
        self.dscp
    }

    /// Pin the IP protocol: injected when unset, accepted when equal.
    pub fn reconcile_protocol(&mut self, expected: u8) -> Result<(), FlowError> {
        match self.protocol {
            None => {
                self.protocol = Some(expected);
                Ok(())
            }
            Some(current) if current == expected => Ok(()),
            Some(current) => Err(FlowError::ProtocolConflict {
                protocol: current,
                expected,
            }),
        }
    }

    pub fn matches(&self, ip: &Ipv4Header) -> bool {
        self.src.is_none_or(|net| net.contains(ip.src))
            && self.dst.is_none_or(|net| net.contains(ip.dst))
            && self.protocol.is_none_or(|p| p == ip.protocol)
            && self.dscp.is_none_or(|d| d == ip.dscp)
    }

    pub fn to_desc(&self) -> Inet4MatchDesc {
        Inet4MatchDesc {
            src: self.src.map(|n| n.address().to_string()),
            src_suffix: self.src.and_then(|n| n.prefix_len()).map(i32::from),
            dst: self.dst.map(|n| n.address().to_string()),
            dst_suffix: self.dst.and_then(|n| n.prefix_len()).map(i32::from),
            protocol: self.protocol.map(i32::from),
            dscp: self.dscp.map(i32::from),
        }
    }
}

impl std::fmt::Display for Inet4Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(net) = self.src {
            parts.push(format!("src={net}"));
        }
        if let Some(net) = self.dst {
            parts.push(format!("dst={net}"));
        }
        if let Some(p) = self.protocol {
            parts.push(format!("proto={p}"));
        }
        if let Some(d) = self.dscp {
            parts.push(format!("dscp={d}"));
        }
        write!(f, "inet4[{}]", parts.join(","))
    }
}

impl TryFrom<Inet4MatchDesc> for Inet4Match {
    type Error = FlowError;

    fn try_from(desc: Inet4MatchDesc) -> Result<Self, Self::Error> {
        Self::create(&desc)
    }
}

impl From<Inet4Match> for Inet4MatchDesc {
    fn from(m: Inet4Match) -> Self {
        m.to_desc()
    }
}

/// Layer-3 match. IPv4 is the only family the match model evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "InetMatchDesc", into = "InetMatchDesc")]
pub enum InetMatch {
    Inet4(Inet4Match),
}

impl InetMatch {
    /// Dispatch on the descriptor family.
    pub fn create(desc: &InetMatchDesc) -> Result<Self, FlowError> {
        match desc {
            InetMatchDesc::Inet4(inner) => Inet4Match::create(inner).map(Self::Inet4),
            InetMatchDesc::Inet6 { .. } => Err(FlowError::Unsupported {
                what: "inet match: IPv6".to_string(),
            }),
        }
    }

    pub fn protocol(&self) -> Option<u8> {
        match self {
            Self::Inet4(m) => m.protocol(),
        }
    }

    pub fn reconcile_protocol(&mut self, expected: u8) -> Result<(), FlowError> {
        match self {
            Self::Inet4(m) => m.reconcile_protocol(expected),
        }
    }

    pub fn matches(&self, ip: &Ipv4Header) -> bool {
        match self {
            Self::Inet4(m) => m.matches(ip),
        }
    }

    pub fn to_desc(&self) -> InetMatchDesc {
        match self {
            Self::Inet4(m) => InetMatchDesc::Inet4(m.to_desc()),
        }
    }
}

impl Default for InetMatch {
    fn default() -> Self {
        Self::Inet4(Inet4Match::default())
    }
}

impl From<Inet4Match> for InetMatch {
    fn from(m: Inet4Match) -> Self {
        Self::Inet4(m)
    }
}

impl std::fmt::Display for InetMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inet4(m) => std::fmt::Display::fmt(m, f),
        }
    }
}

impl TryFrom<InetMatchDesc> for InetMatch {
    type Error = FlowError;

    fn try_from(desc: InetMatchDesc) -> Result<Self, Self::Error> {
        Self::create(&desc)
    }
}

impl From<InetMatch> for InetMatchDesc {
    fn from(m: InetMatch) -> Self {
        m.to_desc()
    }
}
