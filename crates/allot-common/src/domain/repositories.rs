//! Repositories - Persistence abstraction for pools, consumers and entitlements
//!
//! The engine depends only on these traits; storage engines live elsewhere.
//! Implementations are expected to give at least read-committed isolation.

use super::model::*;
use super::value_objects::*;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Repository result type
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Pool Repository trait
#[async_trait]
pub trait PoolRepository: Send + Sync {
    /// Get pool by ID
    async fn get(&self, id: &PoolId) -> RepoResult<Pool>;

    /// Save pool (insert or replace)
    async fn save(&self, pool: &Pool) -> RepoResult<()>;

    /// List every pool
    async fn list(&self) -> RepoResult<Vec<Pool>>;

    /// List pools of one organization
    async fn list_by_owner(&self, owner: &OwnerId) -> RepoResult<Vec<Pool>>;
}

/// Consumer Repository trait
#[async_trait]
pub trait ConsumerRepository: Send + Sync {
    async fn get(&self, id: &ConsumerId) -> RepoResult<Consumer>;
    async fn save(&self, consumer: &Consumer) -> RepoResult<()>;
}

/// Entitlement Repository trait
#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    async fn get(&self, id: &EntitlementId) -> RepoResult<Entitlement>;
    async fn save(&self, entitlement: &Entitlement) -> RepoResult<()>;
    async fn delete(&self, id: &EntitlementId) -> RepoResult<()>;
    async fn by_consumer(&self, consumer: &ConsumerId) -> RepoResult<Vec<Entitlement>>;
    async fn by_consumer_and_product(
        &self,
        consumer: &ConsumerId,
        product: &ProductId,
    ) -> RepoResult<Vec<Entitlement>>;
    async fn by_pool(&self, pool: &PoolId) -> RepoResult<Vec<Entitlement>>;
}

/// In-memory pool repository (for testing and development)
pub struct InMemoryPoolRepository {
    pools: RwLock<HashMap<PoolId, Pool>>,
}

impl InMemoryPoolRepository {
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPoolRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PoolRepository for InMemoryPoolRepository {
    async fn get(&self, id: &PoolId) -> RepoResult<Pool> {
        self.pools
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn save(&self, pool: &Pool) -> RepoResult<()> {
        self.pools.write().insert(pool.id.clone(), pool.clone());
        Ok(())
    }

    async fn list(&self) -> RepoResult<Vec<Pool>> {
        let mut pools: Vec<_> = self.pools.read().values().cloned().collect();
        pools.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pools)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> RepoResult<Vec<Pool>> {
        let mut pools: Vec<_> = self
            .pools
            .read()
            .values()
            .filter(|p| &p.owner == owner)
            .cloned()
            .collect();
        pools.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pools)
    }
}

/// In-memory consumer repository
pub struct InMemoryConsumerRepository {
    consumers: RwLock<HashMap<ConsumerId, Consumer>>,
}

impl InMemoryConsumerRepository {
    pub fn new() -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryConsumerRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsumerRepository for InMemoryConsumerRepository {
    async fn get(&self, id: &ConsumerId) -> RepoResult<Consumer> {
        self.consumers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn save(&self, consumer: &Consumer) -> RepoResult<()> {
        self.consumers
            .write()
            .insert(consumer.id.clone(), consumer.clone());
        Ok(())
    }
}

/// In-memory entitlement repository
pub struct InMemoryEntitlementRepository {
    entitlements: RwLock<HashMap<EntitlementId, Entitlement>>,
}

impl InMemoryEntitlementRepository {
    pub fn new() -> Self {
        Self {
            entitlements: RwLock::new(HashMap::new()),
        }
    }

    fn filtered(&self, pred: impl Fn(&Entitlement) -> bool) -> Vec<Entitlement> {
        let mut found: Vec<_> = self
            .entitlements
            .read()
            .values()
            .filter(|e| pred(e))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        found
    }
}

impl Default for InMemoryEntitlementRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntitlementRepository for InMemoryEntitlementRepository {
    async fn get(&self, id: &EntitlementId) -> RepoResult<Entitlement> {
        self.entitlements
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn save(&self, entitlement: &Entitlement) -> RepoResult<()> {
        self.entitlements
            .write()
            .insert(entitlement.id, entitlement.clone());
        Ok(())
    }

    async fn delete(&self, id: &EntitlementId) -> RepoResult<()> {
        self.entitlements
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn by_consumer(&self, consumer: &ConsumerId) -> RepoResult<Vec<Entitlement>> {
        Ok(self.filtered(|e| &e.consumer_id == consumer))
    }

    async fn by_consumer_and_product(
        &self,
        consumer: &ConsumerId,
        product: &ProductId,
    ) -> RepoResult<Vec<Entitlement>> {
        Ok(self.filtered(|e| &e.consumer_id == consumer && &e.product_id == product))
    }

    async fn by_pool(&self, pool: &PoolId) -> RepoResult<Vec<Entitlement>> {
        Ok(self.filtered(|e| &e.pool_id == pool))
    }
}
