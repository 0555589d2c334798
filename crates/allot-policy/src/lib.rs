//! Entitlement Policy Engine
//!
//! Decides whether a consumer may draw a quantity from a pool before any
//! capacity is touched.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Rule Evaluation                          │
//! │                                                             │
//! │  ┌─────────────┐ resolve ┌─────────────┐ evaluate ┌───────┐│
//! │  │RuleRegistry │────────►│  RuleChain  │─────────►│Verdict││
//! │  │ (overrides) │         │  (ordered)  │          │       ││
//! │  └─────────────┘         └─────────────┘          └───────┘│
//! │                               │ first blocking deny        │
//! │                               ▼                            │
//! │                          [DENIED]  else [ALLOW + warnings] │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules are pure functions of a [`RuleContext`]; they never lock or mutate,
//! so chains evaluate concurrently without coordination.

#![warn(missing_docs)]

pub mod chain;
pub mod registry;
pub mod rules;

pub use chain::{ChainOutcome, RuleChain, RuleDenial, RuleWarning};
pub use registry::{RuleOverride, RuleRegistry, RuleScope};

use allot_common::{Consumer, Entitlement, PoolSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyVerdict {
    /// Rule passes
    Allow,
    /// Rule objects; blocking denials abort the chain, others become warnings
    Deny {
        /// Human-readable reason
        reason: String,
        /// Whether evaluation stops here
        blocking: bool,
    },
}

impl PolicyVerdict {
    /// Blocking denial
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny { reason: reason.into(), blocking: true }
    }

    /// Non-blocking denial, surfaced as a warning
    pub fn warn(reason: impl Into<String>) -> Self {
        Self::Deny { reason: reason.into(), blocking: false }
    }

    /// Whether this verdict allows the request
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// An entitlement the consumer already holds, with its pool as last seen
#[derive(Debug, Clone)]
pub struct HeldEntitlement {
    /// The entitlement record
    pub entitlement: Entitlement,
    /// Its pool, or `None` if the pool has been retired
    pub pool: Option<PoolSnapshot>,
}

/// Immutable evaluation context handed to every rule
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Requesting consumer
    pub consumer: &'a Consumer,
    /// Requested pool
    pub pool: &'a PoolSnapshot,
    /// Requested quantity
    pub quantity: u64,
    /// Consumer's existing entitlements for the pool's product
    pub held: &'a [HeldEntitlement],
    /// Evaluation time from the injected clock
    pub now: DateTime<Utc>,
}

/// A single eligibility check
///
/// Implementations must be side-effect free; the same context always yields
/// the same verdict.
pub trait PolicyRule: Send + Sync {
    /// Stable name used for ordering, overrides and error reporting
    fn name(&self) -> &str;

    /// Evaluate against a context
    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict;
}

impl std::fmt::Debug for dyn PolicyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PolicyRule({})", self.name())
    }
}
