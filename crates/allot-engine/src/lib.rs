//! Allot Engine - Atomic entitlement allocation
//!
//! Binds consumers to capacity-limited pools without ever granting more than
//! a pool holds, and signals revocation exactly once when a grant goes away.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     EntitlementEngine.bind                       │
//! │                                                                  │
//! │  ┌──────────┐ snapshot ┌───────────┐ allow ┌──────────┐ persist │
//! │  │PoolLedger│─────────►│ RuleChain │──────►│ reserve  │────────►│
//! │  │ (per-pool│          │(fail-fast)│       │  (CAS)   │  commit │
//! │  │  atomics)│◄─────────┴───────────┴───────┤          │         │
//! │  └──────────┘     rollback on failure      └──────────┘         │
//! │                                                                  │
//! │  unbind ──► delete ──► release ──► RevocationCoordinator (once)  │
//! │                                 └─► AuditFeed                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rule evaluation reads a snapshot and may be stale; the reservation is
//! the authoritative capacity check.

#![warn(clippy::all)]

pub mod audit;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod revocation;

pub use audit::{AuditFeed, AuditReceiver};
pub use config::EngineConfig;
pub use engine::{AvailablePool, Binding, CleanupReport, EngineStats, EntitlementEngine, Repositories};
pub use ledger::{PoolLedger, Reservation};
pub use revocation::{QueuedRevocationSink, RevocationCoordinator, RevocationIntent, RevocationSink};
