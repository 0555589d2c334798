//! Ordered rule execution with fail-fast semantics

use crate::{PolicyRule, PolicyVerdict, RuleContext};
use allot_common::AllotError;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Non-blocking denial recorded on a successful evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleWarning {
    /// Rule that raised the warning
    pub rule: String,
    /// Reason given
    pub reason: String,
}

/// Passing evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainOutcome {
    /// Warnings accumulated from non-blocking denials, in chain order
    pub warnings: Vec<RuleWarning>,
}

impl ChainOutcome {
    /// Whether any rule raised a warning
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// First blocking denial
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule '{rule}' denied: {reason}")]
pub struct RuleDenial {
    /// Rule that denied
    pub rule: String,
    /// Reason given
    pub reason: String,
}

impl From<RuleDenial> for AllotError {
    fn from(denial: RuleDenial) -> Self {
        AllotError::PolicyDenied { rule: denial.rule, reason: denial.reason }
    }
}

/// Ordered list of rules resolved for one request
///
/// The chain does not know which concrete rules it holds.
#[derive(Clone, Default)]
pub struct RuleChain {
    rules: Vec<Arc<dyn PolicyRule>>,
}

impl RuleChain {
    /// Build from an ordered list
    pub fn new(rules: Vec<Arc<dyn PolicyRule>>) -> Self {
        Self { rules }
    }

    /// Rule names in evaluation order
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule in order, stopping at the first blocking denial
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<ChainOutcome, RuleDenial> {
        let mut outcome = ChainOutcome::default();

        for rule in &self.rules {
            match rule.evaluate(ctx) {
                PolicyVerdict::Allow => {}
                PolicyVerdict::Deny { reason, blocking: true } => {
                    debug!(
                        rule = rule.name(),
                        pool = %ctx.pool.id,
                        consumer = %ctx.consumer.id,
                        %reason,
                        "blocking denial"
                    );
                    return Err(RuleDenial { rule: rule.name().to_string(), reason });
                }
                PolicyVerdict::Deny { reason, blocking: false } => {
                    debug!(rule = rule.name(), pool = %ctx.pool.id, %reason, "warning");
                    outcome.warnings.push(RuleWarning { rule: rule.name().to_string(), reason });
                }
            }
        }

        Ok(outcome)
    }
}

impl std::fmt::Debug for RuleChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
