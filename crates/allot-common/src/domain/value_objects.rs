//! Value Objects - Immutable domain primitives with validation
//!
//! Value Objects are:
//! - Immutable
//! - Comparable by value (not identity)
//! - Self-validating

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pool identifier (Value Object)
///
/// # Invariants
/// - Must be non-empty
/// - Max 64 characters
/// - Alphanumeric with hyphens and underscores only
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PoolId(String);

impl PoolId {
    /// Create new pool ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        if id.is_empty() {
            return Err(DomainError::InvalidId { kind: "pool", reason: "cannot be empty".into() });
        }
        if id.len() > 64 {
            return Err(DomainError::InvalidId { kind: "pool", reason: "max 64 characters".into() });
        }
        if !id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(DomainError::InvalidId { kind: "pool", reason: "alphanumeric only".into() });
        }

        Ok(Self(id))
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PoolId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PoolId> for String {
    fn from(id: PoolId) -> Self {
        id.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-empty string identifiers that need no further validation.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create new identifier; rejects empty strings
            pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(DomainError::InvalidId { kind: $kind, reason: "cannot be empty".into() });
                }
                Ok(Self(id))
            }

            /// Get inner value
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Consumer identifier (system, person, hypervisor...)
    ConsumerId,
    "consumer"
);
string_id!(
    /// Owning organization identifier
    OwnerId,
    "owner"
);
string_id!(
    /// Product identifier
    ProductId,
    "product"
);

/// Entitlement identifier, generated on bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntitlementId(Uuid);

impl EntitlementId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get inner UUID
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntitlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pool capacity
///
/// Serialized as an integer where any negative value means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Quantity {
    /// Finite capacity
    Limited(u64),
    /// No capacity ceiling
    Unlimited,
}

impl Quantity {
    /// Whether this is the unlimited sentinel
    pub const fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Quantity still available after `consumed`; `None` when unlimited
    pub fn remaining(&self, consumed: u64) -> Option<u64> {
        match self {
            Self::Limited(total) => Some(total.saturating_sub(consumed)),
            Self::Unlimited => None,
        }
    }

    /// Whether `consumed + requested` fits
    pub fn admits(&self, consumed: u64, requested: u64) -> bool {
        match self {
            Self::Limited(total) => consumed
                .checked_add(requested)
                .is_some_and(|sum| sum <= *total),
            Self::Unlimited => true,
        }
    }
}

impl From<i64> for Quantity {
    fn from(raw: i64) -> Self {
        if raw < 0 {
            Self::Unlimited
        } else {
            Self::Limited(raw as u64)
        }
    }
}

impl From<Quantity> for i64 {
    fn from(q: Quantity) -> Self {
        match q {
            Quantity::Limited(total) => i64::try_from(total).unwrap_or(i64::MAX),
            Quantity::Unlimited => -1,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(total) => write!(f, "{}", total),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Domain errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid {kind} ID: {reason}")]
    InvalidId { kind: &'static str, reason: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_id_valid() {
        let id = PoolId::new("pool-2024_a").unwrap();
        assert_eq!(id.as_str(), "pool-2024_a");
    }

    #[test]
    fn test_pool_id_rejects_bad_input() {
        assert!(PoolId::new("").is_err());
        assert!(PoolId::new("a".repeat(65)).is_err());
        assert!(PoolId::new("pool/1").is_err());
    }

    #[test]
    fn test_string_ids_reject_blank() {
        assert!(ConsumerId::new("   ").is_err());
        assert!(OwnerId::new("").is_err());
        assert_eq!(ProductId::new("rhel").unwrap().to_string(), "rhel");
    }

    #[test]
    fn test_pool_id_deserialize_validates() {
        let ok: PoolId = serde_json::from_str("\"p1\"").unwrap();
        assert_eq!(ok.as_str(), "p1");
        assert!(serde_json::from_str::<PoolId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_quantity_admits() {
        let q = Quantity::Limited(10);
        assert!(q.admits(9, 1));
        assert!(!q.admits(10, 1));
        assert!(!q.admits(u64::MAX, 1));
        assert!(Quantity::Unlimited.admits(u64::MAX - 1, 1));
        assert_eq!(q.remaining(12), Some(0));
        assert_eq!(Quantity::Unlimited.remaining(5), None);
    }

    #[test]
    fn test_quantity_sentinel_serialization() {
        assert_eq!(serde_json::to_string(&Quantity::Unlimited).unwrap(), "-1");
        assert_eq!(serde_json::from_str::<Quantity>("-1").unwrap(), Quantity::Unlimited);
        assert_eq!(serde_json::from_str::<Quantity>("25").unwrap(), Quantity::Limited(25));
    }
}
