//! Error types for allocation

use crate::domain::{DomainError, EntitlementId, PoolId, RepositoryError};
use thiserror::Error;

/// Allocation error type
///
/// Every failure a caller of bind/unbind can observe. None are swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllotError {
    /// A blocking rule failed; nothing was mutated
    #[error("policy denied by rule '{rule}': {reason}")]
    PolicyDenied { rule: String, reason: String },

    /// Lost the race for remaining quantity
    #[error("capacity exceeded on pool {pool}: requested {requested}, available {available}")]
    CapacityExceeded {
        pool: PoolId,
        requested: u64,
        available: u64,
    },

    /// Could not serialize access to the pool counter within bounded retries
    #[error("contention on pool {pool} after {attempts} attempts")]
    Contention { pool: PoolId, attempts: u32 },

    /// Store rejected a write; any reservation was rolled back first
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[source] RepositoryError),

    /// Referenced pool, consumer or entitlement does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Granted quantities must be at least one
    #[error("invalid quantity: {0}")]
    InvalidQuantity(u64),

    /// Re-bind released the old entitlement but the new bind failed
    #[error("rebind released entitlement {released} but the new bind failed: {source}")]
    RebindFailed {
        released: EntitlementId,
        source: Box<AllotError>,
    },

    /// Malformed record handed to the engine
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] DomainError),

    /// Engine configuration rejected
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl AllotError {
    /// Pool lookup failure
    pub fn pool_not_found(id: &PoolId) -> Self {
        Self::NotFound { kind: "pool", id: id.to_string() }
    }

    /// Entitlement lookup failure
    pub fn entitlement_not_found(id: &EntitlementId) -> Self {
        Self::NotFound { kind: "entitlement", id: id.to_string() }
    }

    /// Whether retrying (possibly elsewhere) can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::CapacityExceeded { .. })
    }

    /// Name of the rule that denied the request, if any
    pub fn rule_name(&self) -> Option<&str> {
        match self {
            Self::PolicyDenied { rule, .. } => Some(rule),
            Self::RebindFailed { source, .. } => source.rule_name(),
            _ => None,
        }
    }
}

/// Result type for allocation
pub type AllotResult<T> = Result<T, AllotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let pool = PoolId::new("p1").unwrap();
        assert!(AllotError::Contention { pool: pool.clone(), attempts: 3 }.is_transient());
        assert!(AllotError::CapacityExceeded { pool: pool.clone(), requested: 1, available: 0 }.is_transient());
        assert!(!AllotError::pool_not_found(&pool).is_transient());
        assert!(!AllotError::PolicyDenied { rule: "expiration".into(), reason: "expired".into() }.is_transient());
    }

    #[test]
    fn test_rule_name_through_rebind() {
        let err = AllotError::RebindFailed {
            released: EntitlementId::generate(),
            source: Box::new(AllotError::PolicyDenied {
                rule: "quantity".into(),
                reason: "not enough".into(),
            }),
        };
        assert_eq!(err.rule_name(), Some("quantity"));
        assert!(err.to_string().contains("not enough"));
    }
}
