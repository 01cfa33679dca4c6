// Focused sub-traits for recording controller metrics.
//
// All methods take `&self`; implementations use interior mutability.
// Default implementations are no-ops so test mocks only override what
// they check.

// ── Flow condition metrics ─────────────────────────────────────────

pub trait FlowMetrics: Send + Sync {
    /// Set the number of configured flow conditions.
    fn set_flow_conditions(&self, _count: u64) {}

    /// Set the number of matches held by one condition.
    fn set_flow_matches(&self, _condition: &str, _count: u64) {}

    /// Forget the per-condition gauges of a removed condition.
    fn remove_flow_condition(&self, _condition: &str) {}

    /// Record one packet classification with its result label.
    fn record_packet_classified(&self, _result: &str) {}

    /// Record a flow action applied to a packet.
    fn record_flow_action_applied(&self, _action: &str) {}
}

// ── MAC mapping metrics ────────────────────────────────────────────

pub trait MacMapMetrics: Send + Sync {
    /// Set the number of active hosts of one MAC mapping.
    fn set_macmap_active_hosts(&self, _map: &str, _count: u64) {}

    /// Set the number of port/VLAN networks of one MAC mapping.
    fn set_macmap_networks(&self, _map: &str, _count: u64) {}

    /// Record an activation rejected as a duplicate.
    fn record_macmap_duplicate(&self, _map: &str) {}

    /// Record a replication attempt (`success` or `failure`).
    fn record_macmap_replication(&self, _map: &str, _result: &str) {}
}

// ── Composite super-trait ──────────────────────────────────────────

/// Unified metrics port composing all sub-traits.
///
/// Services accept `Arc<dyn MetricsPort>`.
pub trait MetricsPort: FlowMetrics + MacMapMetrics {}

impl<T> MetricsPort for T where T: FlowMetrics + MacMapMetrics {}
