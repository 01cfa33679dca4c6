use ports::secondary::metrics_port::{FlowMetrics, MacMapMetrics};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ── Label types ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ConditionLabels {
    pub condition: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ActionLabels {
    pub action: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MapLabels {
    pub map: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReplicationLabels {
    pub map: String,
    pub result: String,
}

// ── Controller metrics registry ─────────────────────────────────────

/// Prometheus metrics registry for the controller.
///
/// Metric families are atomics, so recording only needs `&self`. Wrap in
/// `Arc` to share between services.
pub struct ControllerMetrics {
    registry: Registry,
    pub flow_conditions: Gauge,
    pub flow_matches: Family<ConditionLabels, Gauge>,
    pub packets_classified_total: Family<ResultLabels, Counter>,
    pub flow_actions_applied_total: Family<ActionLabels, Counter>,
    pub macmap_active_hosts: Family<MapLabels, Gauge>,
    pub macmap_networks: Family<MapLabels, Gauge>,
    pub macmap_duplicates_total: Family<MapLabels, Counter>,
    pub macmap_replications_total: Family<ReplicationLabels, Counter>,
}

impl ControllerMetrics {
    /// Create a registry with every metric registered under the `vnet`
    /// prefix.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("vnet");

        let flow_conditions = Gauge::default();
        registry.register(
            "flow_conditions",
            "Number of configured flow conditions",
            flow_conditions.clone(),
        );

        let flow_matches = Family::<ConditionLabels, Gauge>::default();
        registry.register(
            "flow_matches",
            "Number of matches per flow condition",
            flow_matches.clone(),
        );

        let packets_classified_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "packets_classified",
            "Packets evaluated against flow conditions, by result",
            packets_classified_total.clone(),
        );

        let flow_actions_applied_total = Family::<ActionLabels, Counter>::default();
        registry.register(
            "flow_actions_applied",
            "Flow actions applied to packets, by action",
            flow_actions_applied_total.clone(),
        );

        let macmap_active_hosts = Family::<MapLabels, Gauge>::default();
        registry.register(
            "macmap_active_hosts",
            "Active hosts per MAC mapping",
            macmap_active_hosts.clone(),
        );

        let macmap_networks = Family::<MapLabels, Gauge>::default();
        registry.register(
            "macmap_networks",
            "Port/VLAN networks in use per MAC mapping",
            macmap_networks.clone(),
        );

        let macmap_duplicates_total = Family::<MapLabels, Counter>::default();
        registry.register(
            "macmap_duplicates",
            "Host activations rejected because the MAC is active on another VLAN",
            macmap_duplicates_total.clone(),
        );

        let macmap_replications_total = Family::<ReplicationLabels, Counter>::default();
        registry.register(
            "macmap_replications",
            "MAC mapping state replications, by result",
            macmap_replications_total.clone(),
        );

        Self {
            registry,
            flow_conditions,
            flow_matches,
            packets_classified_total,
            flow_actions_applied_total,
            macmap_active_hosts,
            macmap_networks,
            macmap_duplicates_total,
            macmap_replications_total,
        }
    }

    /// Encode all metrics in OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn gauge_value(count: u64) -> i64 {
    count.try_into().unwrap_or(i64::MAX)
}

fn map_labels(map: &str) -> MapLabels {
    MapLabels {
        map: map.to_string(),
    }
}

// ── Sub-trait implementations ──────────────────────────────────────

impl FlowMetrics for ControllerMetrics {
    fn set_flow_conditions(&self, count: u64) {
        self.flow_conditions.set(gauge_value(count));
    }

    fn set_flow_matches(&self, condition: &str, count: u64) {
        self.flow_matches
            .get_or_create(&ConditionLabels {
                condition: condition.to_string(),
            })
            .set(gauge_value(count));
    }

    fn remove_flow_condition(&self, condition: &str) {
        self.flow_matches.remove(&ConditionLabels {
            condition: condition.to_string(),
        });
    }

    fn record_packet_classified(&self, result: &str) {
        self.packets_classified_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn record_flow_action_applied(&self, action: &str) {
        self.flow_actions_applied_total
            .get_or_create(&ActionLabels {
                action: action.to_string(),
            })
            .inc();
    }
}

impl MacMapMetrics for ControllerMetrics {
    fn set_macmap_active_hosts(&self, map: &str, count: u64) {
        self.macmap_active_hosts
            .get_or_create(&map_labels(map))
            .set(gauge_value(count));
    }

    fn set_macmap_networks(&self, map: &str, count: u64) {
        self.macmap_networks
            .get_or_create(&map_labels(map))
            .set(gauge_value(count));
    }

    fn record_macmap_duplicate(&self, map: &str) {
        self.macmap_duplicates_total
            .get_or_create(&map_labels(map))
            .inc();
    }

    fn record_macmap_replication(&self, map: &str, result: &str) {
        self.macmap_replications_total
            .get_or_create(&ReplicationLabels {
                map: map.to_string(),
                result: result.to_string(),
            })
            .inc();
    }
}
