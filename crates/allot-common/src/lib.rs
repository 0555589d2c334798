//! Allot Common - Shared types for pool-based entitlement allocation
//!
//! This crate provides:
//! - Validated identifiers and the pool capacity type
//! - Pool, Consumer and Entitlement records
//! - The allocation error taxonomy
//! - Domain events for the audit feed
//! - Repository traits with in-memory implementations
//! - An injectable clock

#![warn(clippy::all)]

pub mod clock;
pub mod domain;
pub mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::*;
pub use error::*;
