use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use domain::action::context::PacketContext;
use domain::action::entity::FlowActionList;
use domain::common::error::DomainError;
use domain::flow::condition::{ConditionResult, FlowCondition, MatchChange};
use domain::flow::flow_match::FlowMatch;
use domain::flow::packet::Packet;
use ports::secondary::flow_condition_store::FlowConditionStore;
use ports::secondary::metrics_port::MetricsPort;
use tracing::{debug, info, trace, warn};

/// Result of classifying a packet against every flow condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Name of the first condition, in name order, accepting the packet.
    pub condition: String,
    /// Index of the accepting match. `None` if the condition is empty.
    pub index: Option<u16>,
}

/// Application-level flow condition service.
///
/// Owns the named flow conditions, persists changes through the optional
/// store and keeps metrics current. Designed to be wrapped in `RwLock`
/// for shared access; classification only needs a read lock.
pub struct FlowConditionAppService {
    conditions: BTreeMap<String, FlowCondition>,
    store: Option<Arc<dyn FlowConditionStore>>,
    metrics: Arc<dyn MetricsPort>,
}

impl FlowConditionAppService {
    pub fn new(store: Option<Arc<dyn FlowConditionStore>>, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            conditions: BTreeMap::new(),
            store,
            metrics,
        }
    }

    /// Replace every condition (configuration reload). Duplicate names
    /// reject the whole reload.
    pub fn reload(&mut self, conditions: Vec<FlowCondition>) -> Result<(), DomainError> {
        let mut next = BTreeMap::new();
        for cond in conditions {
            let name = cond.name().to_string();
            if next.insert(name.clone(), cond).is_some() {
                return Err(DomainError::Conflict(format!(
                    "duplicate flow condition '{name}'"
                )));
            }
        }

        for name in self.conditions.keys() {
            if !next.contains_key(name) {
                self.metrics.remove_flow_condition(name);
                self.unpersist(name);
            }
        }
        self.conditions = next;
        for cond in self.conditions.values() {
            self.persist(cond);
            self.metrics
                .set_flow_matches(cond.name(), cond.len() as u64);
        }
        self.update_count_metric();
        info!(count = self.conditions.len(), "flow conditions reloaded");
        Ok(())
    }

    /// Rebuild conditions from the store. Descriptors that no longer
    /// validate are skipped with a warning. Returns the number loaded.
    pub fn restore(&mut self) -> Result<usize, DomainError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let descs = store.load_conditions()?;
        let mut restored = BTreeMap::new();
        for desc in &descs {
            match FlowCondition::create(desc) {
                Ok(cond) => {
                    restored.insert(cond.name().to_string(), cond);
                }
                Err(e) => warn!(condition = %desc.name, error = %e, "skipping stored flow condition"),
            }
        }
        for name in self.conditions.keys() {
            if !restored.contains_key(name) {
                self.metrics.remove_flow_condition(name);
            }
        }
        self.conditions = restored;
        for cond in self.conditions.values() {
            self.metrics
                .set_flow_matches(cond.name(), cond.len() as u64);
        }
        self.update_count_metric();
        info!(count = self.conditions.len(), "flow conditions restored");
        Ok(self.conditions.len())
    }

    pub fn add_condition(&mut self, cond: FlowCondition) -> Result<(), DomainError> {
        let Entry::Vacant(slot) = self.conditions.entry(cond.name().to_string()) else {
            return Err(DomainError::Conflict(format!(
                "flow condition '{}' already exists",
                cond.name()
            )));
        };
        let cond = slot.insert(cond);
        info!(condition = %cond.name(), matches = cond.len(), "flow condition added");
        self.metrics.set_flow_matches(cond.name(), cond.len() as u64);
        let cond = cond.clone();
        self.persist(&cond);
        self.update_count_metric();
        Ok(())
    }

    pub fn remove_condition(&mut self, name: &str) -> Result<FlowCondition, DomainError> {
        let cond = self
            .conditions
            .remove(name)
            .ok_or_else(|| not_found(name))?;
        info!(condition = %name, "flow condition removed");
        self.unpersist(name);
        self.metrics.remove_flow_condition(name);
        self.update_count_metric();
        Ok(cond)
    }

    /// Insert or replace one match. Returns `None` when nothing changed.
    pub fn set_match(
        &mut self,
        name: &str,
        fm: FlowMatch,
    ) -> Result<Option<MatchChange>, DomainError> {
        let cond = self
            .conditions
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;
        let index = fm.index();
        let change = cond.set_match(fm);
        if let Some(change) = change {
            info!(condition = %name, index, ?change, "flow match updated");
            let cond = cond.clone();
            self.after_change(&cond);
        }
        Ok(change)
    }

    /// Replace every match of one condition. Returns whether it changed.
    pub fn set_matches(&mut self, name: &str, matches: Vec<FlowMatch>) -> Result<bool, DomainError> {
        let cond = self
            .conditions
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;
        let changed = cond.set_matches(matches)?;
        if changed {
            info!(condition = %name, matches = cond.len(), "flow matches replaced");
            let cond = cond.clone();
            self.after_change(&cond);
        }
        Ok(changed)
    }

    pub fn remove_match(&mut self, name: &str, index: u16) -> Result<Option<FlowMatch>, DomainError> {
        let cond = self
            .conditions
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;
        let removed = cond.remove_match(index);
        if removed.is_some() {
            info!(condition = %name, index, "flow match removed");
            let cond = cond.clone();
            self.after_change(&cond);
        }
        Ok(removed)
    }

    pub fn condition(&self, name: &str) -> Option<&FlowCondition> {
        self.conditions.get(name)
    }

    /// All conditions in name order.
    pub fn list(&self) -> Vec<&FlowCondition> {
        self.conditions.values().collect()
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Evaluate one named condition.
    pub fn evaluate(&self, name: &str, packet: &Packet) -> Result<ConditionResult, DomainError> {
        let cond = self.conditions.get(name).ok_or_else(|| not_found(name))?;
        let result = cond.evaluate(packet);
        trace!(condition = %name, result = result.as_str(), "flow condition evaluated");
        self.metrics.record_packet_classified(result.as_str());
        Ok(result)
    }

    /// First condition, in name order, that accepts the packet.
    pub fn classify(&self, packet: &Packet) -> Option<Classification> {
        let found = self.conditions.values().find_map(|cond| {
            let index = match cond.evaluate(packet) {
                ConditionResult::Matched(index) => Some(index),
                ConditionResult::MatchedAll => None,
                ConditionResult::Unmatched => return None,
            };
            Some(Classification {
                condition: cond.name().to_string(),
                index,
            })
        });
        match &found {
            Some(c) => {
                trace!(condition = %c.condition, index = ?c.index, "packet classified");
                self.metrics.record_packet_classified("matched");
            }
            None => {
                trace!("packet matched no flow condition");
                self.metrics.record_packet_classified("unmatched");
            }
        }
        found
    }

    /// Apply `actions` in order. Returns how many were applied.
    pub fn apply_actions(&self, actions: &FlowActionList, ctx: &mut PacketContext) -> usize {
        let mut applied = 0;
        for action in actions {
            if action.apply(ctx) {
                self.metrics.record_flow_action_applied(action.kind());
                applied += 1;
            } else {
                trace!(action = %action, "flow action not applicable");
            }
        }
        applied
    }

    fn after_change(&self, cond: &FlowCondition) {
        self.metrics.set_flow_matches(cond.name(), cond.len() as u64);
        self.persist(cond);
    }

    fn persist(&self, cond: &FlowCondition) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_condition(&cond.to_desc()) {
            warn!(condition = %cond.name(), error = %e, "failed to persist flow condition");
        } else {
            debug!(condition = %cond.name(), "flow condition persisted");
        }
    }

    fn unpersist(&self, name: &str) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.delete_condition(name) {
            warn!(condition = %name, error = %e, "failed to delete stored flow condition");
        }
    }

    fn update_count_metric(&self) {
        self.metrics
            .set_flow_conditions(self.conditions.len() as u64);
    }
}

fn not_found(name: &str) -> DomainError {
    DomainError::NotFound(format!("flow condition '{name}'"))
}
