//! Rules that look at the consumer and what it already holds

use super::{ARCHITECTURE, CONFLICT, ELIGIBILITY, PHYSICAL_ONLY, SOCKET_COVERAGE, VIRT_ONLY};
use crate::{PolicyRule, PolicyVerdict, RuleContext};
use allot_common::{ConsumerType, PoolAttributes, ARCH_FACT, SOCKET_FACT};

/// Consumer must belong to the pool's organization and be of a permitted type
///
/// A product naming `requires_consumer_type` admits exactly that type;
/// otherwise the unrestricted types apply.
#[derive(Debug, Clone)]
pub struct EligibilityRule {
    unrestricted: Vec<ConsumerType>,
}

impl EligibilityRule {
    /// Rule admitting `unrestricted` types for products without a requirement
    pub fn new(unrestricted: Vec<ConsumerType>) -> Self {
        Self { unrestricted }
    }
}

impl Default for EligibilityRule {
    fn default() -> Self {
        Self::new(vec![ConsumerType::System, ConsumerType::Hypervisor])
    }
}

impl PolicyRule for EligibilityRule {
    fn name(&self) -> &str {
        ELIGIBILITY
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        let consumer = ctx.consumer;
        let pool = ctx.pool;

        if consumer.owner != pool.owner {
            return PolicyVerdict::deny(format!(
                "pool {} belongs to organization {}, consumer to {}",
                pool.id, pool.owner, consumer.owner
            ));
        }

        let permitted = match pool.required_consumer_type() {
            Some(required) => consumer.consumer_type.label() == required,
            None => self.unrestricted.contains(&consumer.consumer_type),
        };

        if permitted {
            PolicyVerdict::Allow
        } else {
            PolicyVerdict::deny(format!(
                "consumer type '{}' is not permitted for product {}",
                consumer.consumer_type, pool.product_id
            ))
        }
    }
}

/// Virt-only pools are for virtual guests
#[derive(Debug, Default, Clone, Copy)]
pub struct VirtOnlyRule;

impl PolicyRule for VirtOnlyRule {
    fn name(&self) -> &str {
        VIRT_ONLY
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        if ctx.pool.is_virt_only() && !ctx.consumer.is_guest() {
            PolicyVerdict::deny(format!("pool {} is restricted to virtual guests", ctx.pool.id))
        } else {
            PolicyVerdict::Allow
        }
    }
}

/// Physical-only pools refuse virtual guests
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicalOnlyRule;

impl PolicyRule for PhysicalOnlyRule {
    fn name(&self) -> &str {
        PHYSICAL_ONLY
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        if ctx.pool.is_physical_only() && ctx.consumer.is_guest() {
            PolicyVerdict::deny(format!("pool {} is restricted to physical machines", ctx.pool.id))
        } else {
            PolicyVerdict::Allow
        }
    }
}

/// Warn when the product does not support the consumer's architecture
///
/// `X86` also covers `I386`, `I586` and `I686`; `ALL` covers anything.
/// Non-system consumers that report no architecture are not checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchitectureRule;

impl ArchitectureRule {
    fn supports(supported: &[String], machine: &str) -> bool {
        let machine = machine.trim().to_ascii_uppercase();
        supported.iter().any(|arch| {
            arch == "ALL"
                || *arch == machine
                || (arch == "X86" && matches!(machine.as_str(), "I386" | "I586" | "I686"))
        })
    }
}

impl PolicyRule for ArchitectureRule {
    fn name(&self) -> &str {
        ARCHITECTURE
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        let Some(supported) = ctx.pool.architectures() else {
            return PolicyVerdict::Allow;
        };

        let matched = match ctx.consumer.fact(ARCH_FACT) {
            Some(machine) => Self::supports(&supported, machine),
            None if ctx.consumer.consumer_type != ConsumerType::System => true,
            None => supported.iter().any(|a| a == "ALL"),
        };

        if matched {
            PolicyVerdict::Allow
        } else {
            PolicyVerdict::warn(format!(
                "product {} does not support architecture '{}'",
                ctx.pool.product_id,
                ctx.consumer.fact(ARCH_FACT).unwrap_or("unknown")
            ))
        }
    }
}

/// Deny when the consumer holds the same product from a different, exclusive pool
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictRule;

impl PolicyRule for ConflictRule {
    fn name(&self) -> &str {
        CONFLICT
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        let conflicting = ctx.held.iter().find(|h| {
            h.entitlement.pool_id != ctx.pool.id
                && h.entitlement.product_id == ctx.pool.product_id
                && h.pool.as_ref().is_some_and(|p| p.is_exclusive())
        });

        match conflicting {
            Some(h) => PolicyVerdict::deny(format!(
                "consumer already holds {} through exclusive pool {}",
                h.entitlement.product_id, h.entitlement.pool_id
            )),
            None => PolicyVerdict::Allow,
        }
    }
}

/// Warn when the product does not cover all of the consumer's sockets
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketCoverageRule;

impl PolicyRule for SocketCoverageRule {
    fn name(&self) -> &str {
        SOCKET_COVERAGE
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> PolicyVerdict {
        let (Some(per_unit), Some(sockets)) = (ctx.pool.sockets(), ctx.consumer.fact_u64(SOCKET_FACT)) else {
            return PolicyVerdict::Allow;
        };

        let covered = per_unit.saturating_mul(ctx.quantity);
        if sockets > covered {
            PolicyVerdict::warn(format!(
                "consumer has {} sockets, {} unit(s) of {} cover {}",
                sockets, ctx.quantity, ctx.pool.product_id, covered
            ))
        } else {
            PolicyVerdict::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use allot_common::{
        OwnerId, ProductId, Quantity, ARCH, EXCLUSIVE, GUEST_FACT, REQUIRES_CONSUMER_TYPE, SOCKETS,
    };

    #[test]
    fn test_eligibility_default_types() {
        let p = snapshot("p1", Quantity::Limited(10), 0);

        let system = consumer(ConsumerType::System);
        let hypervisor = consumer(ConsumerType::Hypervisor);
        let person = consumer(ConsumerType::Person);

        let rule = EligibilityRule::default();
        assert!(rule.evaluate(&context(&system, &p, 1, &[])).is_allow());
        assert!(rule.evaluate(&context(&hypervisor, &p, 1, &[])).is_allow());
        assert!(!rule.evaluate(&context(&person, &p, 1, &[])).is_allow());
    }

    #[test]
    fn test_eligibility_required_type() {
        let mut p = snapshot("p1", Quantity::Limited(10), 0);
        p.attributes.insert(REQUIRES_CONSUMER_TYPE.into(), "person".into());

        let rule = EligibilityRule::default();
        assert!(rule.evaluate(&context(&consumer(ConsumerType::Person), &p, 1, &[])).is_allow());
        assert!(!rule.evaluate(&context(&consumer(ConsumerType::System), &p, 1, &[])).is_allow());
    }

    #[test]
    fn test_eligibility_other_organization() {
        let mut p = snapshot("p1", Quantity::Limited(10), 0);
        p.owner = OwnerId::new("globex").unwrap();

        let verdict = EligibilityRule::default().evaluate(&context(&consumer(ConsumerType::System), &p, 1, &[]));
        assert!(!verdict.is_allow());
    }

    #[test]
    fn test_conflict_with_exclusive_pool() {
        let c = consumer(ConsumerType::System);
        let requested = snapshot("p2", Quantity::Limited(10), 0);

        let mut exclusive = snapshot("p1", Quantity::Limited(10), 1);
        exclusive.attributes.insert(EXCLUSIVE.into(), "true".into());
        let plain = snapshot("p3", Quantity::Limited(10), 1);

        assert!(!ConflictRule.evaluate(&context(&c, &requested, 1, &[held(&exclusive, 1)])).is_allow());
        assert!(ConflictRule.evaluate(&context(&c, &requested, 1, &[held(&plain, 1)])).is_allow());

        // Same pool is the multi-entitlement rule's business
        assert!(ConflictRule.evaluate(&context(&c, &exclusive, 1, &[held(&exclusive, 1)])).is_allow());

        let mut other_product = exclusive.clone();
        other_product.product_id = ProductId::new("jboss").unwrap();
        assert!(ConflictRule.evaluate(&context(&c, &requested, 1, &[held(&other_product, 1)])).is_allow());
    }

    #[test]
    fn test_virt_only_requires_guest() {
        let mut p = snapshot("p1", Quantity::Limited(10), 0);
        p.attributes.insert(allot_common::VIRT_ONLY.into(), "true".into());

        let guest = consumer(ConsumerType::System).with_fact(GUEST_FACT, "true");
        let host = consumer(ConsumerType::System).with_fact(GUEST_FACT, "false");
        let unknown = consumer(ConsumerType::System);

        assert!(VirtOnlyRule.evaluate(&context(&guest, &p, 1, &[])).is_allow());
        assert!(!VirtOnlyRule.evaluate(&context(&host, &p, 1, &[])).is_allow());
        assert!(!VirtOnlyRule.evaluate(&context(&unknown, &p, 1, &[])).is_allow());

        let plain = snapshot("p2", Quantity::Limited(10), 0);
        assert!(VirtOnlyRule.evaluate(&context(&host, &plain, 1, &[])).is_allow());
    }

    #[test]
    fn test_physical_only_refuses_guest() {
        let mut p = snapshot("p1", Quantity::Limited(10), 0);
        p.attributes.insert(allot_common::PHYSICAL_ONLY.into(), "true".into());

        let guest = consumer(ConsumerType::System).with_fact(GUEST_FACT, "true");
        let host = consumer(ConsumerType::System);

        match PhysicalOnlyRule.evaluate(&context(&guest, &p, 1, &[])) {
            PolicyVerdict::Deny { blocking, .. } => assert!(blocking),
            PolicyVerdict::Allow => panic!("guest admitted to physical-only pool"),
        }
        assert!(PhysicalOnlyRule.evaluate(&context(&host, &p, 1, &[])).is_allow());
    }

    #[test]
    fn test_architecture_mismatch_warns() {
        let mut p = snapshot("p1", Quantity::Limited(10), 0);
        p.attributes.insert(ARCH.into(), "x86,ppc64".into());

        let i686 = consumer(ConsumerType::System).with_fact(ARCH_FACT, "i686");
        let ppc = consumer(ConsumerType::System).with_fact(ARCH_FACT, "ppc64");
        let arm = consumer(ConsumerType::System).with_fact(ARCH_FACT, "aarch64");

        assert!(ArchitectureRule.evaluate(&context(&i686, &p, 1, &[])).is_allow());
        assert!(ArchitectureRule.evaluate(&context(&ppc, &p, 1, &[])).is_allow());
        match ArchitectureRule.evaluate(&context(&arm, &p, 1, &[])) {
            PolicyVerdict::Deny { blocking, .. } => assert!(!blocking),
            PolicyVerdict::Allow => panic!("expected warning"),
        }

        // Missing fact: only systems are held to the product's list
        assert!(!ArchitectureRule.evaluate(&context(&consumer(ConsumerType::System), &p, 1, &[])).is_allow());
        assert!(ArchitectureRule.evaluate(&context(&consumer(ConsumerType::Person), &p, 1, &[])).is_allow());

        p.attributes.insert(ARCH.into(), "ALL".into());
        assert!(ArchitectureRule.evaluate(&context(&arm, &p, 1, &[])).is_allow());
    }

    #[test]
    fn test_socket_coverage_warns() {
        let c = consumer(ConsumerType::System).with_fact(SOCKET_FACT, "4");
        let mut p = snapshot("p1", Quantity::Limited(10), 0);
        p.attributes.insert(SOCKETS.into(), "2".into());

        match SocketCoverageRule.evaluate(&context(&c, &p, 1, &[])) {
            PolicyVerdict::Deny { blocking, .. } => assert!(!blocking),
            PolicyVerdict::Allow => panic!("expected warning"),
        }
        assert!(SocketCoverageRule.evaluate(&context(&c, &p, 2, &[])).is_allow());

        let no_fact = consumer(ConsumerType::System);
        assert!(SocketCoverageRule.evaluate(&context(&no_fact, &p, 1, &[])).is_allow());
    }
}
