//! Rules that look only at the pool and the request

use super::{EXPIRATION, MULTI_ENTITLEMENT, QUANTITY};
use crate::{PolicyRule, PolicyVerdict, RuleContext};
use allot_common::PoolAttributes;

/// Deny when now is outside `[start, end]`
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpirationRule;

impl PolicyRule for ExpirationRule {
    fn name(&self) -> &str {
        EXPIRATION
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        let pool = ctx.pool;
        if ctx.now < pool.start {
            PolicyVerdict::deny(format!(
                "subscriptions for {} start on {}",
                pool.product_id, pool.start
            ))
        } else if ctx.now > pool.end {
            PolicyVerdict::deny(format!(
                "subscriptions for {} expired on {}",
                pool.product_id, pool.end
            ))
        } else {
            PolicyVerdict::Allow
        }
    }
}

/// Without `multi-entitlement`, a consumer gets one unit from a pool, once
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiEntitlementRule;

impl PolicyRule for MultiEntitlementRule {
    fn name(&self) -> &str {
        MULTI_ENTITLEMENT
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        if ctx.pool.is_multi_entitlement() {
            return PolicyVerdict::Allow;
        }
        if ctx.quantity > 1 {
            return PolicyVerdict::deny(format!(
                "pool {} does not support multi-entitlement",
                ctx.pool.id
            ));
        }
        if ctx.held.iter().any(|h| h.entitlement.pool_id == ctx.pool.id) {
            return PolicyVerdict::deny(format!(
                "consumer {} already has an entitlement from pool {}",
                ctx.consumer.id, ctx.pool.id
            ));
        }
        PolicyVerdict::Allow
    }
}

/// Advisory capacity check against the snapshot
///
/// The ledger's reservation is authoritative; this only fails fast.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuantityRule;

impl PolicyRule for QuantityRule {
    fn name(&self) -> &str {
        QUANTITY
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        match ctx.pool.remaining() {
            Some(remaining) if ctx.quantity > remaining => PolicyVerdict::deny(format!(
                "no entitlements available: requested {}, remaining {}",
                ctx.quantity, remaining
            )),
            _ => PolicyVerdict::Allow,
        }
    }
}
