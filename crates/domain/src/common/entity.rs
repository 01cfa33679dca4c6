use serde::{Deserialize, Serialize};

// ── Protocol constants ──────────────────────────────────────────────

/// Ethernet type codes referenced by the match model.
pub mod ether_type {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86dd;
}

/// IP protocol numbers referenced by the match model.
pub mod ip_proto {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

/// 802.1Q VLAN identifier. `0` designates untagged traffic.
pub type VlanId = u16;

/// Largest VLAN ID accepted by the match model.
pub const VLAN_ID_MAX: VlanId = 4095;

/// Largest 802.1p priority code point.
pub const VLAN_PCP_MAX: u8 = 7;

/// Largest DSCP value (6 bits).
pub const DSCP_MAX: u8 = 63;

// ── MAC address ─────────────────────────────────────────────────────

/// 48-bit Ethernet MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const ZERO: MacAddr = MacAddr([0; 6]);
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    /// Parse `aa:bb:cc:dd:ee:ff` (or `aa-bb-cc-dd-ee-ff`).
    pub fn parse(s: &str) -> Result<Self, &'static str> {
        let sep = if s.contains('-') { '-' } else { ':' };
        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.split(sep) {
            if count == 6 {
                return Err("too many octets");
            }
            if part.is_empty() || part.len() > 2 {
                return Err("malformed octet");
            }
            bytes[count] = u8::from_str_radix(part, 16).map_err(|_| "malformed octet")?;
            count += 1;
        }
        if count != 6 {
            return Err("expected 6 octets");
        }
        Ok(Self(bytes))
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Pack into the low 48 bits of a `u64`.
    pub fn to_u64(self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Inverse of [`MacAddr::to_u64`]. Bits above 48 are ignored.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 6];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (value >> (40 - i * 8)) as u8;
        }
        Self(bytes)
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl std::str::FromStr for MacAddr {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
