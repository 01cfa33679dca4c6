use serde::Serialize;

use super::desc::PortRangeDesc;
use super::error::FlowError;

/// Inclusive transport port range. A single port is `[p, p]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            from: port,
            to: port,
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.from && port <= self.to
    }

    pub fn is_single(&self) -> bool {
        self.from == self.to
    }

    /// Build from an external descriptor. `to` defaults to `from`.
    pub(crate) fn from_desc(
        layer: &'static str,
        field: &'static str,
        desc: &PortRangeDesc,
    ) -> Result<Self, FlowError> {
        let Some(from) = desc.from else {
            return Err(FlowError::MissingPortFrom { layer, field });
        };
        let from_port = to_port(layer, field, from)?;
        let to_value = match desc.to {
            Some(to) => {
                let port = to_port(layer, field, to)?;
                if from_port > port {
                    return Err(FlowError::InvalidPortRange {
                        layer,
                        field,
                        from,
                        to,
                    });
                }
                port
            }
            None => from_port,
        };
        Ok(Self {
            from: from_port,
            to: to_value,
        })
    }

    pub fn to_desc(&self) -> PortRangeDesc {
        PortRangeDesc {
            from: Some(i32::from(self.from)),
            to: (!self.is_single()).then_some(i32::from(self.to)),
        }
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

fn to_port(layer: &'static str, field: &'static str, value: i32) -> Result<u16, FlowError> {
    u16::try_from(value).map_err(|_| FlowError::invalid(layer, field, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let range = PortRange { from: 80, to: 443 };
        assert!(range.contains(80));
        assert!(range.contains(443));
        assert!(range.contains(200));
        assert!(!range.contains(79));
        assert!(!range.contains(444));
    }

    #[test]
    fn single_port() {
        let range = PortRange::single(22);
        assert!(range.contains(22));
        assert!(!range.contains(21));
        assert!(!range.contains(23));
        assert_eq!(range.to_string(), "22");
    }

    // ── Descriptor conversion ─────────────────────────────────────

    #[test]
    fn from_desc_defaults_to_single() {
        let range = PortRange::from_desc("TCP", "source port", &PortRangeDesc::single(53)).unwrap();
        assert_eq!(range, PortRange::single(53));
    }

    #[test]
    fn from_desc_rejects_inverted() {
        let err = PortRange::from_desc("UDP", "destination port", &PortRangeDesc::range(20, 10))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "UDP: Invalid destination port range: from=20, to=10"
        );
    }

    #[test]
    fn from_desc_rejects_out_of_range() {
        assert!(PortRange::from_desc("TCP", "source port", &PortRangeDesc::single(-1)).is_err());
        assert!(PortRange::from_desc("TCP", "source port", &PortRangeDesc::single(65536)).is_err());
        assert!(
            PortRange::from_desc("TCP", "source port", &PortRangeDesc::range(1, 65536)).is_err()
        );
        assert!(PortRange::from_desc("TCP", "source port", &PortRangeDesc::single(65535)).is_ok());
    }

    #[test]
    fn from_desc_rejects_to_without_from() {
        let desc = PortRangeDesc {
            from: None,
            to: Some(80),
        };
        let err = PortRange::from_desc("TCP", "source port", &desc).unwrap_err();
        assert_eq!(err, FlowError::MissingPortFrom {
            layer: "TCP",
            field: "source port"
        });
    }

    #[test]
    fn to_desc_reconstructs_equal_range() {
        for range in [PortRange::single(7), PortRange { from: 1000, to: 2000 }] {
            let back = PortRange::from_desc("TCP", "source port", &range.to_desc()).unwrap();
            assert_eq!(back, range);
        }
    }
}
