use std::net::Ipv4Addr;

use serde::Serialize;

use super::error::FlowError;

/// Smallest and largest CIDR suffix accepted for a match network.
/// `/0` and `/32` are rejected: the former matches everything and the
/// latter is spelled as a plain host address.
pub const SUFFIX_MIN: u8 = 1;
pub const SUFFIX_MAX: u8 = 31;

/// IPv4 address with an optional CIDR suffix.
///
/// The stored address is always in network form (`addr & mask`), so two
/// networks built from different host addresses in the same subnet
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Ipv4Network {
    addr: u32,
    prefix_len: Option<u8>,
}

impl Ipv4Network {
    /// Single host address.
    pub fn host(addr: Ipv4Addr) -> Self {
        Self {
            addr: u32::from(addr),
            prefix_len: None,
        }
    }

    /// Network with a `1..=31` suffix. The address is masked.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, FlowError> {
        if !(SUFFIX_MIN..=SUFFIX_MAX).contains(&prefix_len) {
            return Err(FlowError::invalid("Inet4", "CIDR suffix", prefix_len));
        }
        let mask = prefix_to_mask(prefix_len);
        Ok(Self {
            addr: u32::from(addr) & mask,
            prefix_len: Some(prefix_len),
        })
    }

    pub fn address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.addr)
    }

    pub fn prefix_len(&self) -> Option<u8> {
        self.prefix_len
    }

    pub fn mask(&self) -> u32 {
        self.prefix_len.map_or(!0u32, prefix_to_mask)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & self.mask() == self.addr
    }

    /// Build from descriptor text. Returns `None` when neither the address
    /// nor the suffix is present.
    pub(crate) fn from_desc(
        field: &'static str,
        addr: Option<&str>,
        suffix: Option<i32>,
    ) -> Result<Option<Self>, FlowError> {
        let Some(text) = addr else {
            if suffix.is_some() {
                return Err(FlowError::SuffixWithoutAddress {
                    layer: "Inet4",
                    field,
                });
            }
            return Ok(None);
        };

        let ip: Ipv4Addr = text
            .trim()
            .parse()
            .map_err(|_| FlowError::invalid("Inet4", field, text))?;

        match suffix {
            None => Ok(Some(Self::host(ip))),
            Some(s) => {
                let len = u8::try_from(s)
                    .ok()
                    .filter(|l| (SUFFIX_MIN..=SUFFIX_MAX).contains(l))
                    .ok_or_else(|| FlowError::invalid("Inet4", "CIDR suffix", s))?;
                Self::new(ip, len).map(Some)
            }
        }
    }
}

impl std::fmt::Display for Ipv4Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.prefix_len {
            Some(len) => write!(f, "{}/{len}", self.address()),
            None => write!(f, "{}", self.address()),
        }
    }
}

/// Convert an IPv4 prefix length to a bitmask, e.g. 24 -> `0xFFFF_FF00`.
fn prefix_to_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else if prefix_len >= 32 {
        !0u32
    } else {
        !0u32 << (32 - prefix_len)
    }
}
