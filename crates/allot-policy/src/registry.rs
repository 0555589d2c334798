//! Lock-free rule registry with hot-swappable overrides
//!
//! Holds the default chain plus per-organization and per-product overrides.
//! Chains are resolved at request time: defaults first, then organization
//! overrides, then product overrides, each applied in installation order.

use crate::rules::standard_rules;
use crate::{PolicyRule, RuleChain};
use allot_common::{OwnerId, ProductId};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Where an override applies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleScope {
    /// Every request against pools of this organization
    Owner(OwnerId),
    /// Every request against pools of this product
    Product(ProductId),
}

/// One modification of the resolved chain
#[derive(Debug, Clone)]
pub enum RuleOverride {
    /// Swap the rule with the same name in place; appended if absent
    Replace(Arc<dyn PolicyRule>),
    /// Add after the current chain
    Append(Arc<dyn PolicyRule>),
    /// Drop the rule with this name
    Disable(String),
}

impl RuleOverride {
    fn apply(&self, rules: &mut Vec<Arc<dyn PolicyRule>>) {
        match self {
            Self::Replace(rule) => match rules.iter().position(|r| r.name() == rule.name()) {
                Some(idx) => rules[idx] = rule.clone(),
                None => rules.push(rule.clone()),
            },
            Self::Append(rule) => rules.push(rule.clone()),
            Self::Disable(name) => rules.retain(|r| r.name() != name),
        }
    }
}

#[derive(Clone, Default)]
struct RegistryState {
    defaults: Vec<Arc<dyn PolicyRule>>,
    by_owner: HashMap<OwnerId, Vec<RuleOverride>>,
    by_product: HashMap<ProductId, Vec<RuleOverride>>,
}

/// Mapping from rule name to implementation, with scoped overrides
pub struct RuleRegistry {
    state: ArcSwap<RegistryState>,
    version: AtomicU64,
}

impl RuleRegistry {
    /// Registry with no rules at all
    pub fn empty() -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState::default()),
            version: AtomicU64::new(0),
        }
    }

    /// Registry seeded with the standard chain
    pub fn new() -> Self {
        Self::with_defaults(standard_rules())
    }

    /// Registry seeded with a custom default chain
    pub fn with_defaults(defaults: Vec<Arc<dyn PolicyRule>>) -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState { defaults, ..Default::default() }),
            version: AtomicU64::new(1),
        }
    }

    /// Current version, bumped on every change
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Default chain names in order
    pub fn default_names(&self) -> Vec<String> {
        self.state.load().defaults.iter().map(|r| r.name().to_string()).collect()
    }

    /// Look up a default rule by name
    pub fn rule(&self, name: &str) -> Option<Arc<dyn PolicyRule>> {
        self.state.load().defaults.iter().find(|r| r.name() == name).cloned()
    }

    /// Replace (or append) a default rule
    pub fn register(&self, rule: Arc<dyn PolicyRule>) {
        debug!(rule = rule.name(), "registering default rule");
        self.update(|state| RuleOverride::Replace(rule.clone()).apply(&mut state.defaults));
    }

    /// Install an override for a scope
    pub fn install(&self, scope: RuleScope, rule_override: RuleOverride) {
        debug!(?scope, ?rule_override, "installing rule override");
        self.update(|state| {
            let slot = match &scope {
                RuleScope::Owner(owner) => state.by_owner.entry(owner.clone()).or_default(),
                RuleScope::Product(product) => state.by_product.entry(product.clone()).or_default(),
            };
            slot.push(rule_override.clone());
        });
    }

    /// Remove every override for a scope
    pub fn clear(&self, scope: &RuleScope) {
        self.update(|state| match scope {
            RuleScope::Owner(owner) => {
                state.by_owner.remove(owner);
            }
            RuleScope::Product(product) => {
                state.by_product.remove(product);
            }
        });
    }

    /// Resolve the chain for a request against a pool of `owner`/`product`
    pub fn resolve(&self, owner: &OwnerId, product: &ProductId) -> RuleChain {
        let state = self.state.load();
        let mut rules = state.defaults.clone();

        for ov in state.by_owner.get(owner).into_iter().flatten() {
            ov.apply(&mut rules);
        }
        for ov in state.by_product.get(product).into_iter().flatten() {
            ov.apply(&mut rules);
        }

        RuleChain::new(rules)
    }

    fn update(&self, f: impl Fn(&mut RegistryState)) {
        self.state.rcu(|current| {
            let mut next = RegistryState::clone(current);
            f(&mut next);
            next
        });
        self.version.fetch_add(1, Ordering::Release);
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::rules::*;
    use crate::{PolicyVerdict, RuleContext};
    use allot_common::{ConsumerType, Quantity};

    struct AlwaysDeny(&'static str);

    impl PolicyRule for AlwaysDeny {
        fn name(&self) -> &str {
            self.0
        }

        fn evaluate(&self, _ctx: &RuleContext<'_>) -> PolicyVerdict {
            PolicyVerdict::deny("organization policy")
        }
    }

    fn acme() -> OwnerId {
        OwnerId::new("acme").unwrap()
    }

    fn rhel() -> ProductId {
        ProductId::new("rhel").unwrap()
    }

    #[test]
    fn test_resolve_defaults() {
        let registry = RuleRegistry::new();
        let chain = registry.resolve(&acme(), &rhel());
        assert_eq!(chain.names(), registry.default_names());
        assert_eq!(chain.len(), 9);
    }

    #[test]
    fn test_owner_and_product_overrides() {
        let registry = RuleRegistry::new();
        registry.install(RuleScope::Owner(acme()), RuleOverride::Disable(SOCKET_COVERAGE.into()));
        registry.install(RuleScope::Owner(acme()), RuleOverride::Append(Arc::new(AlwaysDeny("audit_hold"))));
        registry.install(RuleScope::Product(rhel()), RuleOverride::Replace(Arc::new(AlwaysDeny(QUANTITY))));

        let chain = registry.resolve(&acme(), &rhel());
        assert_eq!(
            chain.names(),
            vec![
                EXPIRATION,
                ELIGIBILITY,
                VIRT_ONLY,
                PHYSICAL_ONLY,
                CONFLICT,
                MULTI_ENTITLEMENT,
                QUANTITY,
                ARCHITECTURE,
                "audit_hold"
            ]
        );

        // Other organizations and products see the defaults
        let other = registry.resolve(&OwnerId::new("globex").unwrap(), &ProductId::new("jboss").unwrap());
        assert_eq!(other.len(), 9);

        let c = consumer(ConsumerType::System);
        let p = snapshot("p1", Quantity::Limited(10), 0);
        let denial = chain.evaluate(&context(&c, &p, 1, &[])).unwrap_err();
        assert_eq!(denial.rule, QUANTITY);
        assert_eq!(denial.reason, "organization policy");
    }

    #[test]
    fn test_clear_and_version() {
        let registry = RuleRegistry::new();
        let v0 = registry.version();

        registry.install(RuleScope::Owner(acme()), RuleOverride::Disable(EXPIRATION.into()));
        assert_eq!(registry.resolve(&acme(), &rhel()).len(), 8);
        assert!(registry.version() > v0);

        registry.clear(&RuleScope::Owner(acme()));
        assert_eq!(registry.resolve(&acme(), &rhel()).len(), 9);
    }

    #[test]
    fn test_register_replaces_default_in_place() {
        let registry = RuleRegistry::new();
        registry.register(Arc::new(AlwaysDeny(ELIGIBILITY)));

        assert_eq!(registry.default_names()[1], ELIGIBILITY);
        assert_eq!(registry.default_names().len(), 9);
        assert!(registry.rule(ELIGIBILITY).is_some());
        assert!(registry.rule("missing").is_none());
        assert!(RuleRegistry::empty().resolve(&acme(), &rhel()).is_empty());
    }
}
