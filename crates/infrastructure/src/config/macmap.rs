//! MAC mapping section.

use std::collections::BTreeSet;

use domain::common::entity::VLAN_ID_MAX;
use domain::macmap::entity::{MacMapRef, MacMapSettings, MacVlan};
use serde::{Deserialize, Serialize};

use super::common::{ConfigError, MAX_ALLOWED_HOSTS, check_limit};

/// YAML representation of one MAC mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacMapConfig {
    pub tenant: String,
    pub bridge: String,

    /// Hosts written as `aa:bb:cc:dd:ee:ff@vlan`; `@vlan` defaults to 0.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,

    #[serde(default)]
    pub mapped_vlans: Vec<u16>,
}

impl MacMapConfig {
    pub fn map_ref(&self) -> MacMapRef {
        MacMapRef::new(self.tenant.clone(), self.bridge.clone())
    }

    /// Parse allow-list and VLAN set into domain settings.
    pub(super) fn to_settings(&self, idx: usize) -> Result<MacMapSettings, ConfigError> {
        let prefix = format!("mac_maps[{idx}]");
        if self.tenant.is_empty() || self.bridge.is_empty() {
            return Err(ConfigError::validation(
                prefix,
                "tenant and bridge must not be empty",
            ));
        }
        check_limit(
            &format!("{prefix}.allowed_hosts"),
            self.allowed_hosts.len(),
            MAX_ALLOWED_HOSTS,
        )?;

        let allowed_hosts = self
            .allowed_hosts
            .iter()
            .enumerate()
            .map(|(i, host)| {
                MacVlan::parse(host)
                    .map_err(|e| ConfigError::validation(format!("{prefix}.allowed_hosts[{i}]"), e))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut mapped_vlans = BTreeSet::new();
        for (i, vlan) in self.mapped_vlans.iter().enumerate() {
            if *vlan > VLAN_ID_MAX {
                return Err(ConfigError::validation(
                    format!("{prefix}.mapped_vlans[{i}]"),
                    format!("VLAN ID {vlan} exceeds {VLAN_ID_MAX}"),
                ));
            }
            mapped_vlans.insert(*vlan);
        }

        Ok(MacMapSettings {
            map: self.map_ref(),
            allowed_hosts,
            mapped_vlans,
        })
    }
}
