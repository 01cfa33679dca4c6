use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("{layer}: Invalid {field}: {value}")]
    InvalidField {
        layer: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("{layer}: Invalid {field} range: from={from}, to={to}")]
    InvalidPortRange {
        layer: &'static str,
        field: &'static str,
        from: i32,
        to: i32,
    },

    #[error("{layer}: {field} range: \"from\" is not specified")]
    MissingPortFrom {
        layer: &'static str,
        field: &'static str,
    },

    #[error("{layer}: {field} CIDR suffix is specified without address")]
    SuffixWithoutAddress {
        layer: &'static str,
        field: &'static str,
    },

    #[error("Ethernet: VLAN priority requires a valid VLAN ID: priority={priority}")]
    PriorityWithoutVlan { priority: u8 },

    #[error("Ethernet type conflict: type=0x{ether_type:x}, expected=0x{expected:x}")]
    EtherTypeConflict { ether_type: u16, expected: u16 },

    #[error("IP protocol conflict: proto={protocol}, expected={expected}")]
    ProtocolConflict { protocol: u8, expected: u8 },

    #[error("Match index cannot be null")]
    MissingIndex,

    #[error("Invalid match index: {index}")]
    InvalidIndex { index: i64 },

    #[error("Duplicate match index: {index}")]
    DuplicateIndex { index: u16 },

    #[error("Unsupported {what}")]
    Unsupported { what: String },

    #[error("Invalid flow condition name '{name}': {reason}")]
    InvalidConditionName { name: String, reason: &'static str },
}

impl FlowError {
    pub(crate) fn invalid(layer: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::InvalidField {
            layer,
            field,
            value: value.to_string(),
        }
    }
}

impl From<FlowError> for DomainError {
    fn from(e: FlowError) -> Self {
        DomainError::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_messages_name_both_values() {
        let e = FlowError::EtherTypeConflict {
            ether_type: 0x86dd,
            expected: 0x0800,
        };
        assert_eq!(
            e.to_string(),
            "Ethernet type conflict: type=0x86dd, expected=0x800"
        );

        let e = FlowError::ProtocolConflict {
            protocol: 17,
            expected: 6,
        };
        assert_eq!(e.to_string(), "IP protocol conflict: proto=17, expected=6");
    }

    #[test]
    fn flow_errors_are_bad_requests() {
        let err: DomainError = FlowError::DuplicateIndex { index: 3 }.into();
        assert!(err.is_bad_request());
        assert_eq!(err.to_string(), "bad request: Duplicate match index: 3");
    }
}
