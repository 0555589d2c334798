//! Records - Pool, Consumer and Entitlement
//!
//! Pools and consumers are owned by an organization and created outside the
//! engine. Entitlements are produced only by a successful bind.

use super::value_objects::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Product attribute naming the consumer type a product is restricted to
pub const REQUIRES_CONSUMER_TYPE: &str = "requires_consumer_type";
/// Product attribute allowing quantity > 1 and repeated binds per consumer
pub const MULTI_ENTITLEMENT: &str = "multi-entitlement";
/// Pool attribute making entitlements conflict with other pools of the same product
pub const EXCLUSIVE: &str = "exclusive";
/// Product attribute: sockets covered per unit
pub const SOCKETS: &str = "sockets";
/// Consumer fact: physical socket count
pub const SOCKET_FACT: &str = "cpu.cpu_socket(s)";
/// Pool attribute restricting the pool to virtual guests
pub const VIRT_ONLY: &str = "virt_only";
/// Pool attribute restricting the pool to physical machines
pub const PHYSICAL_ONLY: &str = "physical_only";
/// Product attribute: comma separated architectures, `ALL` for any
pub const ARCH: &str = "arch";
/// Consumer fact: running as a virtual guest
pub const GUEST_FACT: &str = "virt.is_guest";
/// Consumer fact: machine architecture
pub const ARCH_FACT: &str = "uname.machine";

/// Kind of entity able to hold entitlements
///
/// Serialized as its bare label, so unknown types survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConsumerType {
    System,
    Person,
    Hypervisor,
    Domain,
    Other(String),
}

impl ConsumerType {
    /// Label used by product attributes
    pub fn label(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Person => "person",
            Self::Hypervisor => "hypervisor",
            Self::Domain => "domain",
            Self::Other(label) => label,
        }
    }

    /// Parse a label, falling back to `Other`
    pub fn from_label(label: &str) -> Self {
        match label {
            "system" => Self::System,
            "person" => Self::Person,
            "hypervisor" => Self::Hypervisor,
            "domain" => Self::Domain,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ConsumerType {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<ConsumerType> for String {
    fn from(consumer_type: ConsumerType) -> Self {
        match consumer_type {
            ConsumerType::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for ConsumerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Entity that can hold entitlements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: ConsumerId,
    pub consumer_type: ConsumerType,
    pub owner: OwnerId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub facts: BTreeMap<String, String>,
}

impl Consumer {
    /// Create consumer with no facts
    pub fn new(id: ConsumerId, consumer_type: ConsumerType, owner: OwnerId, created_at: DateTime<Utc>) -> Self {
        Self { id, consumer_type, owner, created_at, facts: BTreeMap::new() }
    }

    /// Builder-style fact
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }

    /// Raw fact value
    pub fn fact(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }

    /// Numeric fact, ignoring values that don't parse
    pub fn fact_u64(&self, key: &str) -> Option<u64> {
        self.fact(key).and_then(|v| v.trim().parse().ok())
    }

    /// Whether the consumer reports itself as a virtual guest
    pub fn is_guest(&self) -> bool {
        self.fact(GUEST_FACT).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

/// Grantable allotment of a product's usage right
///
/// # Invariants
/// - `start <= end`
/// - `consumed <= quantity` unless unlimited (enforced by the ledger)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub owner: OwnerId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub consumed: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Pool {
    /// Create pool with nothing consumed
    pub fn new(
        id: PoolId,
        owner: OwnerId,
        product_id: ProductId,
        quantity: Quantity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvariantViolation(format!(
                "pool {} starts after it ends",
                id
            )));
        }
        Ok(Self {
            id,
            owner,
            product_id,
            quantity,
            consumed: 0,
            start,
            end,
            attributes: BTreeMap::new(),
        })
    }

    /// Builder-style attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether the pool's end date is before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end < now
    }
}

/// Read-only accessors for the attributes the standard rules consult.
///
/// Implemented for both stored pools and ledger snapshots.
pub trait PoolAttributes {
    /// Raw attribute map
    fn attributes(&self) -> &BTreeMap<String, String>;

    /// Attribute value by key
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes().get(key).map(String::as_str)
    }

    /// Attribute parsed as a boolean (`yes`/`true`/`1`)
    fn flag(&self, key: &str) -> bool {
        self.attribute(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "yes" | "true" | "1"))
            .unwrap_or(false)
    }

    /// Consumer type required by the product, if any
    fn required_consumer_type(&self) -> Option<&str> {
        self.attribute(REQUIRES_CONSUMER_TYPE)
    }

    /// Whether the pool permits multiple entitlements per consumer
    fn is_multi_entitlement(&self) -> bool {
        self.flag(MULTI_ENTITLEMENT)
    }

    /// Whether the pool is marked exclusive
    fn is_exclusive(&self) -> bool {
        self.flag(EXCLUSIVE)
    }

    /// Sockets covered per unit
    fn sockets(&self) -> Option<u64> {
        self.attribute(SOCKETS).and_then(|v| v.trim().parse().ok())
    }

    fn is_virt_only(&self) -> bool {
        self.flag(VIRT_ONLY)
    }

    fn is_physical_only(&self) -> bool {
        self.flag(PHYSICAL_ONLY)
    }

    /// Supported architectures, upper-cased; `None` when unrestricted
    fn architectures(&self) -> Option<Vec<String>> {
        self.attribute(ARCH).map(|v| {
            v.split(',')
                .map(|a| a.trim().to_ascii_uppercase())
                .filter(|a| !a.is_empty())
                .collect()
        })
    }
}

impl PoolAttributes for Pool {
    fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Read-only view of a pool's accounting at one instant
///
/// Rules see snapshots, never the live counter. A snapshot may be stale by the
/// time a reservation runs; the ledger re-checks capacity atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub id: PoolId,
    pub owner: OwnerId,
    pub product_id: ProductId,
    pub total: Quantity,
    pub consumed: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attributes: BTreeMap<String, String>,
}

impl PoolSnapshot {
    /// Quantity left; `None` when unlimited
    pub fn remaining(&self) -> Option<u64> {
        self.total.remaining(self.consumed)
    }

    /// Whether `now` falls inside `[start, end]`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    /// Consumed above total, possible only after capacity was cut
    pub fn is_overflowing(&self) -> bool {
        match self.total {
            Quantity::Limited(total) => self.consumed > total,
            Quantity::Unlimited => false,
        }
    }

    /// Materialize back into a storable pool record
    pub fn to_pool(&self) -> Pool {
        Pool {
            id: self.id.clone(),
            owner: self.owner.clone(),
            product_id: self.product_id.clone(),
            quantity: self.total,
            consumed: self.consumed,
            start: self.start,
            end: self.end,
            attributes: self.attributes.clone(),
        }
    }
}

impl From<&Pool> for PoolSnapshot {
    fn from(pool: &Pool) -> Self {
        Self {
            id: pool.id.clone(),
            owner: pool.owner.clone(),
            product_id: pool.product_id.clone(),
            total: pool.quantity,
            consumed: pool.consumed,
            start: pool.start,
            end: pool.end,
            attributes: pool.attributes.clone(),
        }
    }
}

impl PoolAttributes for PoolSnapshot {
    fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Binding record produced by a successful allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: EntitlementId,
    pub consumer_id: ConsumerId,
    pub pool_id: PoolId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub created_at: DateTime<Utc>,
    /// Serial of the issued certificate; owned by the revocation side
    pub certificate_serial: Option<u64>,
}

impl Entitlement {
    /// New entitlement with a fresh identifier
    pub fn new(
        consumer_id: ConsumerId,
        pool_id: PoolId,
        product_id: ProductId,
        quantity: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntitlementId::generate(),
            consumer_id,
            pool_id,
            product_id,
            quantity,
            created_at,
            certificate_serial: None,
        }
    }
}
