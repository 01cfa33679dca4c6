//! Checked field values carried by flow actions. Each type can only hold
//! a value the corresponding header field accepts.

use crate::common::entity::{DSCP_MAX, MacAddr, VLAN_PCP_MAX};

/// Non-zero unicast MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnicastMac(MacAddr);

impl UnicastMac {
    pub fn new(address: MacAddr) -> Option<Self> {
        (!address.is_zero() && address.is_unicast()).then_some(Self(address))
    }

    pub fn get(self) -> MacAddr {
        self.0
    }
}

impl std::fmt::Display for UnicastMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// 802.1p priority code point, `0..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VlanPcp(u8);

impl VlanPcp {
    pub fn new(priority: u8) -> Option<Self> {
        (priority <= VLAN_PCP_MAX).then_some(Self(priority))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for VlanPcp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Differentiated services code point, `0..=63`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dscp(u8);

impl Dscp {
    pub fn new(dscp: u8) -> Option<Self> {
        (dscp <= DSCP_MAX).then_some(Self(dscp))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Full ToS byte with the ECN bits cleared.
    pub fn to_tos(self) -> u8 {
        self.0 << 2
    }
}

impl std::fmt::Display for Dscp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
