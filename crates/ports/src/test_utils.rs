use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use domain::common::error::DomainError;
use domain::flow::desc::FlowConditionDesc;
use domain::macmap::entity::MacMapRef;
use domain::macmap::state::MacMapState;

use crate::secondary::flow_condition_store::FlowConditionStore;
use crate::secondary::macmap_replication_port::MacMapReplicationPort;
use crate::secondary::metrics_port::{FlowMetrics, MacMapMetrics};

/// No-op implementation of all metrics sub-traits for use in tests.
pub struct NoopMetrics;

impl FlowMetrics for NoopMetrics {}
impl MacMapMetrics for NoopMetrics {}

/// Flow condition store backed by a map. `set_failing(true)` makes every
/// call return a store error.
#[derive(Default)]
pub struct InMemoryConditionStore {
    conditions: Mutex<BTreeMap<String, FlowConditionDesc>>,
    failing: AtomicBool,
}

impl InMemoryConditionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conditions(conditions: Vec<FlowConditionDesc>) -> Self {
        let store = Self::new();
        {
            let mut map = store
                .conditions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for desc in conditions {
                map.insert(desc.name.clone(), desc);
            }
        }
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn get(&self, name: &str) -> Option<FlowConditionDesc> {
        self.conditions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.conditions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DomainError::Store("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl FlowConditionStore for InMemoryConditionStore {
    fn save_condition(&self, desc: &FlowConditionDesc) -> Result<(), DomainError> {
        self.check()?;
        self.conditions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(desc.name.clone(), desc.clone());
        Ok(())
    }

    fn delete_condition(&self, name: &str) -> Result<(), DomainError> {
        self.check()?;
        self.conditions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        Ok(())
    }

    fn load_conditions(&self) -> Result<Vec<FlowConditionDesc>, DomainError> {
        self.check()?;
        Ok(self
            .conditions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}

/// Replication port that keeps every published snapshot.
#[derive(Default)]
pub struct RecordingReplication {
    published: Mutex<Vec<(MacMapRef, MacMapState)>>,
    failing: AtomicBool,
}

impl RecordingReplication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn published(&self) -> Vec<(MacMapRef, MacMapState)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl MacMapReplicationPort for RecordingReplication {
    fn publish(&self, map: &MacMapRef, state: &MacMapState) -> Result<(), DomainError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DomainError::Store("replication unavailable".to_string()));
        }
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((map.clone(), state.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_round_trip_and_failure() {
        let store = InMemoryConditionStore::new();
        let desc = FlowConditionDesc {
            name: "web".to_string(),
            matches: Vec::new(),
        };
        store.save_condition(&desc).unwrap();
        assert_eq!(store.get("web"), Some(desc.clone()));
        assert_eq!(store.load_conditions().unwrap(), vec![desc]);

        store.set_failing(true);
        assert!(store.delete_condition("web").is_err());
        assert_eq!(store.len(), 1);

        store.set_failing(false);
        store.delete_condition("web").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn replication_records_snapshots() {
        let repl = RecordingReplication::new();
        let map = MacMapRef::new("t", "b");
        repl.publish(&map, &MacMapState::new()).unwrap();
        repl.set_failing(true);
        assert!(repl.publish(&map, &MacMapState::new()).is_err());
        assert_eq!(repl.count(), 1);
        assert_eq!(repl.published()[0].0, map);
    }
}
