//! Flow condition section.
//!
//! Conditions are written in the same descriptor shape the store persists,
//! so the section deserializes straight into `FlowConditionDesc`.

use std::collections::BTreeSet;

use domain::flow::condition::FlowCondition;
use domain::flow::desc::FlowConditionDesc;

use super::common::{ConfigError, MAX_MATCHES_PER_CONDITION, check_limit};

/// Validate every condition and convert it to the domain type.
pub(super) fn build_conditions(
    descs: &[FlowConditionDesc],
) -> Result<Vec<FlowCondition>, ConfigError> {
    let mut seen = BTreeSet::new();
    let mut conditions = Vec::with_capacity(descs.len());
    for (idx, desc) in descs.iter().enumerate() {
        let prefix = format!("flow_conditions[{idx}]");
        check_limit(
            &format!("{prefix}.matches"),
            desc.matches.len(),
            MAX_MATCHES_PER_CONDITION,
        )?;
        if !seen.insert(desc.name.as_str()) {
            return Err(ConfigError::validation(
                format!("{prefix}.name"),
                format!("duplicate condition name '{}'", desc.name),
            ));
        }
        let condition =
            FlowCondition::create(desc).map_err(|e| ConfigError::validation(&prefix, e))?;
        conditions.push(condition);
    }
    Ok(conditions)
}
