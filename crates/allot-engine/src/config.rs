//! Engine configuration

use allot_common::{AllotError, AllotResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retention is capped at roughly a century
const MAX_RETENTION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Entitlement engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Compare-and-swap attempts per reservation before `Contention`
    pub max_reserve_attempts: u32,
    /// Pause between attempts in microseconds (0 = yield to the runtime only)
    pub contention_backoff_micros: u64,
    /// How long a revocation stays remembered for duplicate suppression;
    /// older marks are pruned by `revoke_expired_pools`
    pub revocation_retention_secs: u64,
    /// Publish domain events to the audit feed
    pub audit_events: bool,
    /// `available_pools` omits pools that pass only with warnings
    pub hide_pools_with_warnings: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reserve_attempts: 64,
            contention_backoff_micros: 0,
            revocation_retention_secs: 30 * 24 * 60 * 60,
            audit_events: true,
            hide_pools_with_warnings: true,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(raw: &str) -> AllotResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| AllotError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unusable settings
    pub fn validate(&self) -> AllotResult<()> {
        if self.revocation_retention_secs == 0 {
            return Err(AllotError::InvalidConfig(
                "revocation_retention_secs must be at least 1".into(),
            ));
        }
        if self.max_reserve_attempts == 0 {
            return Err(AllotError::InvalidConfig(
                "max_reserve_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Backoff between reservation attempts
    pub fn contention_backoff(&self) -> Duration {
        Duration::from_micros(self.contention_backoff_micros)
    }

    /// Age after which a revocation mark may be forgotten
    pub fn revocation_retention(&self) -> chrono::Duration {
        let secs = self.revocation_retention_secs.min(MAX_RETENTION_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}
