use domain::common::error::DomainError;
use domain::flow::desc::FlowConditionDesc;

/// Persistence for flow conditions.
///
/// Conditions are stored as descriptors keyed by condition name; the
/// on-disk encoding belongs to the implementation.
pub trait FlowConditionStore: Send + Sync {
    /// Insert or overwrite the condition named `desc.name`.
    fn save_condition(&self, desc: &FlowConditionDesc) -> Result<(), DomainError>;

    /// Remove a condition. Removing an unknown name is not an error.
    fn delete_condition(&self, name: &str) -> Result<(), DomainError>;

    /// Every stored condition, in name order.
    fn load_conditions(&self) -> Result<Vec<FlowConditionDesc>, DomainError>;
}
