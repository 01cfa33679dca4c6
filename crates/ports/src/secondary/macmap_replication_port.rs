use domain::common::error::DomainError;
use domain::macmap::entity::MacMapRef;
use domain::macmap::state::MacMapState;

/// Propagates MAC mapping state to the other cluster members.
///
/// Called once per mutating operation that left the state dirty, with
/// the state as it is after the mutation.
pub trait MacMapReplicationPort: Send + Sync {
    fn publish(&self, map: &MacMapRef, state: &MacMapState) -> Result<(), DomainError>;
}
