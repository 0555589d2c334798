//! Allocation Domain Model
//!
//! - **Value Objects**: PoolId, ConsumerId, EntitlementId, Quantity
//! - **Records**: Pool, Consumer, Entitlement
//! - **Domain Events**: EntitlementCreated, EntitlementDeleted, PoolExpired
//! - **Repositories**: PoolRepository, ConsumerRepository, EntitlementRepository

pub mod value_objects;
pub mod model;
pub mod events;
pub mod repositories;

pub use value_objects::*;
pub use model::*;
pub use events::*;
pub use repositories::*;
