//! Standard eligibility rules
//!
//! Default evaluation order:
//!
//! | # | Rule | Blocking |
//! |---|------|----------|
//! | 1 | `expiration` | yes |
//! | 2 | `eligibility` | yes |
//! | 3 | `virt_only` | yes |
//! | 4 | `physical_only` | yes |
//! | 5 | `conflict` | yes |
//! | 6 | `multi_entitlement` | yes |
//! | 7 | `quantity` | yes |
//! | 8 | `architecture` | no |
//! | 9 | `socket_coverage` | no |

mod consumer;
mod pool;

pub use consumer::{
    ArchitectureRule, ConflictRule, EligibilityRule, PhysicalOnlyRule, SocketCoverageRule, VirtOnlyRule,
};
pub use pool::{ExpirationRule, MultiEntitlementRule, QuantityRule};

use crate::PolicyRule;
use std::sync::Arc;

/// Rule name: pool validity window
pub const EXPIRATION: &str = "expiration";
/// Rule name: consumer type and organization
pub const ELIGIBILITY: &str = "eligibility";
/// Rule name: pools reserved for virtual guests
pub const VIRT_ONLY: &str = "virt_only";
/// Rule name: pools reserved for physical machines
pub const PHYSICAL_ONLY: &str = "physical_only";
/// Rule name: architecture support warning
pub const ARCHITECTURE: &str = "architecture";
/// Rule name: exclusive-pool conflicts
pub const CONFLICT: &str = "conflict";
/// Rule name: multi-entitlement restrictions
pub const MULTI_ENTITLEMENT: &str = "multi_entitlement";
/// Rule name: advisory capacity check
pub const QUANTITY: &str = "quantity";
/// Rule name: socket coverage warning
pub const SOCKET_COVERAGE: &str = "socket_coverage";

/// The standard chain in default order
pub fn standard_rules() -> Vec<Arc<dyn PolicyRule>> {
    vec![
        Arc::new(ExpirationRule),
        Arc::new(EligibilityRule::default()),
        Arc::new(VirtOnlyRule),
        Arc::new(PhysicalOnlyRule),
        Arc::new(ConflictRule),
        Arc::new(MultiEntitlementRule),
        Arc::new(QuantityRule),
        Arc::new(ArchitectureRule),
        Arc::new(SocketCoverageRule),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_order() {
        let names: Vec<_> = standard_rules().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                EXPIRATION,
                ELIGIBILITY,
                VIRT_ONLY,
                PHYSICAL_ONLY,
                CONFLICT,
                MULTI_ENTITLEMENT,
                QUANTITY,
                ARCHITECTURE,
                SOCKET_COVERAGE,
            ]
        );
    }
}
