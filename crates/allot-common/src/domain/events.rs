//! Domain Events - Record significant occurrences in the domain
//!
//! Events are:
//! - Immutable records of past occurrences
//! - Named in past tense
//! - Emitted only after the change they describe has committed

use super::model::Entitlement;
use super::value_objects::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Base event metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub event_id: Uuid,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Aggregate ID
    pub aggregate_id: String,
    /// Aggregate type
    pub aggregate_type: String,
}

impl EventMetadata {
    pub fn new(aggregate_id: impl Into<String>, aggregate_type: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.to_string(),
        }
    }
}

/// Domain event trait
pub trait DomainEvent: Send + Sync {
    fn event_type(&self) -> &'static str;
    fn metadata(&self) -> &EventMetadata;
}

/// Why an entitlement went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Explicit unbind by the caller
    Unbind,
    /// Quantity change (unbind half of a re-bind)
    Rebind,
    /// The backing pool expired
    PoolExpired,
}

/// Events published to the audit feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntitlementEvent {
    /// A bind committed
    EntitlementCreated {
        metadata: EventMetadata,
        entitlement: Entitlement,
    },
    /// An entitlement was removed and its quantity released
    EntitlementDeleted {
        metadata: EventMetadata,
        entitlement: Entitlement,
        reason: RemovalReason,
    },
    /// A pool passed its end date and was retired
    PoolExpired {
        metadata: EventMetadata,
        pool_id: PoolId,
        revoked: usize,
    },
}

impl EntitlementEvent {
    pub fn created(entitlement: &Entitlement, at: DateTime<Utc>) -> Self {
        Self::EntitlementCreated {
            metadata: EventMetadata::new(entitlement.id.to_string(), "Entitlement", at),
            entitlement: entitlement.clone(),
        }
    }

    pub fn deleted(entitlement: &Entitlement, reason: RemovalReason, at: DateTime<Utc>) -> Self {
        Self::EntitlementDeleted {
            metadata: EventMetadata::new(entitlement.id.to_string(), "Entitlement", at),
            entitlement: entitlement.clone(),
            reason,
        }
    }

    pub fn pool_expired(pool_id: &PoolId, revoked: usize, at: DateTime<Utc>) -> Self {
        Self::PoolExpired {
            metadata: EventMetadata::new(pool_id.as_str(), "Pool", at),
            pool_id: pool_id.clone(),
            revoked,
        }
    }
}

impl DomainEvent for EntitlementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::EntitlementCreated { .. } => "entitlement.created",
            Self::EntitlementDeleted { .. } => "entitlement.deleted",
            Self::PoolExpired { .. } => "pool.expired",
        }
    }

    fn metadata(&self) -> &EventMetadata {
        match self {
            Self::EntitlementCreated { metadata, .. }
            | Self::EntitlementDeleted { metadata, .. }
            | Self::PoolExpired { metadata, .. } => metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entitlement() -> Entitlement {
        Entitlement::new(
            ConsumerId::new("c1").unwrap(),
            PoolId::new("p1").unwrap(),
            ProductId::new("rhel").unwrap(),
            2,
            Utc::now(),
        )
    }

    #[test]
    fn test_created_event() {
        let ent = entitlement();
        let event = EntitlementEvent::created(&ent, Utc::now());

        assert_eq!(event.event_type(), "entitlement.created");
        assert_eq!(event.metadata().aggregate_id, ent.id.to_string());
        assert_eq!(event.metadata().aggregate_type, "Entitlement");
    }

    #[test]
    fn test_event_json_is_tagged() {
        let ent = entitlement();
        let event = EntitlementEvent::deleted(&ent, RemovalReason::PoolExpired, Utc::now());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "entitlement_deleted");
        assert_eq!(json["reason"], "pool_expired");
    }
}
