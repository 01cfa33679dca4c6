//! Controller configuration: structs, parsing, and validation.
//!
//! The config module is split across several sub-modules:
//! - `common`: shared helpers, limits and `ConfigError`
//! - `flow`: flow condition section
//! - `macmap`: MAC mapping section

mod common;
mod flow;
mod macmap;

pub use common::ConfigError;
pub use macmap::MacMapConfig;

use std::path::Path;

use domain::flow::condition::FlowCondition;
use domain::flow::desc::FlowConditionDesc;
use domain::macmap::entity::{MacMapRef, MacMapSettings};
use serde::{Deserialize, Serialize};

use common::{MAX_FLOW_CONDITIONS, MAX_MAC_MAPS, check_limit, warn_if_world_readable};

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    #[serde(default)]
    pub controller: ControllerInfo,

    #[serde(default)]
    pub flow_conditions: Vec<FlowConditionDesc>,

    #[serde(default)]
    pub mac_maps: Vec<MacMapConfig>,
}

impl ControllerConfig {
    /// Load config from a YAML file.
    ///
    /// On Unix, logs a warning if the file is world-readable.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        warn_if_world_readable(path, "config file");
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config after deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_limit(
            "flow_conditions",
            self.flow_conditions.len(),
            MAX_FLOW_CONDITIONS,
        )?;
        check_limit("mac_maps", self.mac_maps.len(), MAX_MAC_MAPS)?;

        flow::build_conditions(&self.flow_conditions)?;

        let mut seen: Vec<MacMapRef> = Vec::with_capacity(self.mac_maps.len());
        for (idx, cfg) in self.mac_maps.iter().enumerate() {
            let settings = cfg.to_settings(idx)?;
            if seen.contains(&settings.map) {
                return Err(ConfigError::Validation {
                    field: format!("mac_maps[{idx}]"),
                    message: format!("duplicate MAC mapping '{}'", settings.map),
                });
            }
            seen.push(settings.map);
        }
        Ok(())
    }

    /// Convert the flow condition section to domain conditions.
    pub fn flow_conditions(&self) -> Result<Vec<FlowCondition>, ConfigError> {
        flow::build_conditions(&self.flow_conditions)
    }

    /// Convert the MAC mapping section to domain settings.
    pub fn mac_map_settings(&self) -> Result<Vec<MacMapSettings>, ConfigError> {
        self.mac_maps
            .iter()
            .enumerate()
            .map(|(idx, cfg)| cfg.to_settings(idx))
            .collect()
    }
}

// ── Controller info ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerInfo {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for ControllerInfo {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}
fn default_log_format() -> LogFormat {
    LogFormat::Text
}

// ── Log level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Log format ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::Ipv4Addr;

    use super::*;
    use domain::common::entity::{MacAddr, ether_type, ip_proto};
    use domain::flow::packet::{L4Header, Packet};
    use tempfile::NamedTempFile;

    const FULL_YAML: &str = r#"
controller:
  log_level: debug
  log_format: json
flow_conditions:
  - name: web
    matches:
      - index: 1
        l4: { protocol: tcp, dst: { from: 80, to: 443 } }
      - index: 5
        ethernet: { vlan: 10 }
  - name: dns
    matches:
      - index: 1
        l4: { protocol: udp, dst: { from: 53 } }
mac_maps:
  - tenant: t1
    bridge: b1
    allowed_hosts: ["00:11:22:33:44:55@10"]
    mapped_vlans: [10, 20]
"#;

    // ── Loading ───────────────────────────────────────────────────

    #[test]
    fn load_empty_config() {
        let config = ControllerConfig::from_yaml("{}").unwrap();
        assert_eq!(config.controller.log_level, LogLevel::Info);
        assert_eq!(config.controller.log_format, LogFormat::Text);
        assert!(config.flow_conditions.is_empty());
        assert!(config.mac_maps.is_empty());
    }

    #[test]
    fn load_full_config() {
        let config = ControllerConfig::from_yaml(FULL_YAML).unwrap();
        assert_eq!(config.controller.log_level, LogLevel::Debug);
        assert_eq!(config.controller.log_format, LogFormat::Json);

        let conditions = config.flow_conditions().unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].len(), 2);

        let pkt = Packet::ethernet(
            MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x66]),
            ether_type::IPV4,
        )
        .with_ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), ip_proto::TCP, 0)
        .with_l4(L4Header::Tcp {
            src_port: 40000,
            dst_port: 443,
        });
        assert!(conditions[0].matches(&pkt));
        assert!(!conditions[1].matches(&pkt));

        let maps = config.mac_map_settings().unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].map, MacMapRef::new("t1", "b1"));
        assert_eq!(maps[0].allowed_hosts.len(), 1);
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL_YAML.as_bytes()).unwrap();
        let config = ControllerConfig::load(file.path()).unwrap();
        assert_eq!(config.flow_conditions.len(), 2);
    }

    #[test]
    fn load_missing_file() {
        let err = ControllerConfig::load(Path::new("/nonexistent/vnet.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    // ── Validation ────────────────────────────────────────────────

    #[test]
    fn unknown_field_rejected() {
        assert!(matches!(
            ControllerConfig::from_yaml("bogus: 1").unwrap_err(),
            ConfigError::Yaml(_)
        ));
    }

    #[test]
    fn invalid_match_rejected() {
        let yaml = r"
flow_conditions:
  - name: bad
    matches:
      - index: 1
        ethernet: { vlan: 5000 }
";
        let err = ControllerConfig::from_yaml(yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: flow_conditions[0]: Ethernet: Invalid VLAN ID: 5000"
        );
    }

    #[test]
    fn duplicate_mac_map_rejected() {
        let yaml = r"
mac_maps:
  - { tenant: t1, bridge: b1 }
  - { tenant: t1, bridge: b1 }
";
        let err = ControllerConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("mac_maps[1]"));
    }

    #[test]
    fn too_many_conditions_rejected() {
        let config = ControllerConfig {
            flow_conditions: (0..=MAX_FLOW_CONDITIONS)
                .map(|i| FlowConditionDesc {
                    name: format!("c{i}"),
                    matches: Vec::new(),
                })
                .collect(),
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    // ── LogLevel / LogFormat ──────────────────────────────────────

    #[test]
    fn log_level_from_yaml() {
        let config = ControllerConfig::from_yaml("controller: { log_level: warn }").unwrap();
        assert_eq!(config.controller.log_level, LogLevel::Warn);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert!(ControllerConfig::from_yaml("controller: { log_level: loud }").is_err());
    }

    #[test]
    fn log_format_from_yaml() {
        let config = ControllerConfig::from_yaml("controller: { log_format: json }").unwrap();
        assert_eq!(config.controller.log_format, LogFormat::Json);
        assert_eq!(LogFormat::Text.to_string(), "text");
        assert!(ControllerConfig::from_yaml("controller: { log_format: xml }").is_err());
    }
}
