use thiserror::Error;

use crate::common::error::DomainError;

use super::entity::{MacMapRef, MacVlan, SwitchPort};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacMapError {
    /// The MAC address of `host` is already active on another VLAN.
    #[error("{map}: {host} conflicts with {existing} mapped on {port}")]
    Duplicate {
        map: MacMapRef,
        host: MacVlan,
        existing: MacVlan,
        port: SwitchPort,
    },

    #[error("invalid host '{value}': {reason}")]
    InvalidHost { value: String, reason: &'static str },
}

impl From<MacMapError> for DomainError {
    fn from(e: MacMapError) -> Self {
        match e {
            MacMapError::Duplicate { .. } => DomainError::Conflict(e.to_string()),
            MacMapError::InvalidHost { .. } => DomainError::BadRequest(e.to_string()),
        }
    }
}
