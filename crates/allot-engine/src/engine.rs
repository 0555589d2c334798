//! Entitlement engine - bind/unbind orchestration
//!
//! A bind is: snapshot, evaluate, reserve, persist, commit. Everything before
//! the reservation is read-only, so a denied or cancelled request leaves no
//! trace. After the reservation, the [`Reservation`] guard rolls the quantity
//! back unless the entitlement record was persisted.

use crate::audit::AuditFeed;
use crate::config::EngineConfig;
use crate::ledger::{PoolLedger, Reservation};
use crate::revocation::{RevocationCoordinator, RevocationSink};
use allot_common::{
    AllotError, AllotResult, Clock, Consumer, ConsumerId, ConsumerRepository, DomainError,
    Entitlement, EntitlementEvent, EntitlementId, EntitlementRepository,
    InMemoryConsumerRepository, InMemoryEntitlementRepository, InMemoryPoolRepository, PoolId,
    PoolRepository, PoolSnapshot, ProductId, Quantity, RemovalReason, RepositoryError,
    SystemClock,
};
use allot_policy::rules::QUANTITY;
use allot_policy::{HeldEntitlement, RuleContext, RuleRegistry, RuleWarning};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Persistence collaborators
#[derive(Clone)]
pub struct Repositories {
    pub pools: Arc<dyn PoolRepository>,
    pub consumers: Arc<dyn ConsumerRepository>,
    pub entitlements: Arc<dyn EntitlementRepository>,
}

impl Repositories {
    pub fn new(
        pools: Arc<dyn PoolRepository>,
        consumers: Arc<dyn ConsumerRepository>,
        entitlements: Arc<dyn EntitlementRepository>,
    ) -> Self {
        Self { pools, consumers, entitlements }
    }

    /// Fresh in-memory stores
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryPoolRepository::new()),
            Arc::new(InMemoryConsumerRepository::new()),
            Arc::new(InMemoryEntitlementRepository::new()),
        )
    }
}

/// Successful bind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub entitlement: Entitlement,
    /// Non-blocking rule warnings, in chain order
    pub warnings: Vec<RuleWarning>,
}

/// Pool the consumer could bind right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailablePool {
    pub pool: PoolSnapshot,
    pub warnings: Vec<RuleWarning>,
}

/// Result of an expired-pool sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub expired_pools: Vec<PoolId>,
    pub revoked: Vec<EntitlementId>,
    /// Revocation marks older than the retention window that were forgotten
    pub pruned_signals: usize,
}

#[derive(Debug, Default)]
struct Counters {
    binds: AtomicU64,
    unbinds: AtomicU64,
    denials: AtomicU64,
    capacity_rejections: AtomicU64,
    contentions: AtomicU64,
    rollbacks: AtomicU64,
}

impl Counters {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub binds: u64,
    pub unbinds: u64,
    pub denials: u64,
    pub capacity_rejections: u64,
    pub contentions: u64,
    pub rollbacks: u64,
    pub pools_tracked: usize,
    pub revocations_signalled: usize,
    pub rules_version: u64,
}

/// Orchestrates binds and unbinds against the ledger and the stores
pub struct EntitlementEngine {
    config: EngineConfig,
    repos: Repositories,
    ledger: PoolLedger,
    rules: Arc<RuleRegistry>,
    revocation: RevocationCoordinator,
    audit: AuditFeed,
    clock: Arc<dyn Clock>,
    counters: Counters,
    /// Serializes pool write-backs so a stale snapshot never lands last
    mirror_locks: DashMap<PoolId, Arc<Mutex<()>>>,
}

impl EntitlementEngine {
    /// Create engine with the standard rules and the system clock
    pub fn new(
        config: EngineConfig,
        repos: Repositories,
        sink: Arc<dyn RevocationSink>,
    ) -> AllotResult<Self> {
        config.validate()?;
        Ok(Self {
            ledger: PoolLedger::new(config.max_reserve_attempts),
            rules: Arc::new(RuleRegistry::new()),
            revocation: RevocationCoordinator::new(sink),
            audit: AuditFeed::disabled(),
            clock: Arc::new(SystemClock),
            counters: Counters::default(),
            mirror_locks: DashMap::new(),
            repos,
            config,
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a rule registry
    pub fn with_rules(mut self, rules: Arc<RuleRegistry>) -> Self {
        self.rules = rules;
        self
    }

    /// Publish to an audit feed
    pub fn with_audit_feed(mut self, feed: AuditFeed) -> Self {
        self.audit = feed;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PoolLedger {
        &self.ledger
    }

    pub fn rules(&self) -> &Arc<RuleRegistry> {
        &self.rules
    }

    pub fn revocation(&self) -> &RevocationCoordinator {
        &self.revocation
    }

    /// Grant `quantity` from `pool_id` to `consumer_id`
    #[instrument(skip_all, fields(consumer = %consumer_id, pool = %pool_id, quantity = quantity))]
    pub async fn bind(
        &self,
        consumer_id: &ConsumerId,
        pool_id: &PoolId,
        quantity: u64,
    ) -> AllotResult<Binding> {
        if quantity == 0 {
            return Err(AllotError::InvalidQuantity(quantity));
        }

        let consumer = self.load_consumer(consumer_id).await?;
        let pool = self.hydrate_pool(pool_id).await?;
        let held = self.held_entitlements(&consumer.id, &pool.product_id).await?;
        let now = self.clock.now();

        let warnings = self.evaluate(&consumer, &pool, quantity, &held, now)?;

        let reservation = self.reserve(pool_id, quantity).await?;
        let entitlement =
            Entitlement::new(consumer.id.clone(), pool.id.clone(), pool.product_id.clone(), quantity, now);

        // Dropping the future while the save is pending drops the reservation too
        if let Err(e) = self.repos.entitlements.save(&entitlement).await {
            self.roll_back(reservation, &e);
            return Err(AllotError::PersistenceFailure(e));
        }
        reservation.commit();

        Counters::inc(&self.counters.binds);
        info!(entitlement = %entitlement.id, warnings = warnings.len(), "bound");

        self.mirror_pool(pool_id).await;
        self.publish(EntitlementEvent::created(&entitlement, now));

        Ok(Binding { entitlement, warnings })
    }

    /// Remove an entitlement and give its quantity back
    ///
    /// A second unbind of the same id fails with `NotFound`.
    #[instrument(skip_all, fields(entitlement = %entitlement_id))]
    pub async fn unbind(&self, entitlement_id: &EntitlementId) -> AllotResult<Entitlement> {
        self.remove(entitlement_id, RemovalReason::Unbind).await
    }

    /// Change an entitlement's quantity: unbind, then bind
    ///
    /// The two steps are independently atomic. If the bind fails the old
    /// entitlement is already gone and `RebindFailed` says so.
    #[instrument(skip_all, fields(entitlement = %entitlement_id, quantity = quantity))]
    pub async fn rebind(&self, entitlement_id: &EntitlementId, quantity: u64) -> AllotResult<Binding> {
        if quantity == 0 {
            return Err(AllotError::InvalidQuantity(quantity));
        }

        let released = self.remove(entitlement_id, RemovalReason::Rebind).await?;

        self.bind(&released.consumer_id, &released.pool_id, quantity)
            .await
            .map_err(|e| {
                warn!(entitlement = %released.id, error = %e, "rebind lost the entitlement");
                AllotError::RebindFailed { released: released.id, source: Box::new(e) }
            })
    }

    /// Bind several pools for one consumer, all or nothing
    #[instrument(skip_all, fields(consumer = %consumer_id, requests = requests.len()))]
    pub async fn bind_many(
        &self,
        consumer_id: &ConsumerId,
        requests: &[(PoolId, u64)],
    ) -> AllotResult<Vec<Binding>> {
        if let Some((_, quantity)) = requests.iter().find(|(_, q)| *q == 0) {
            return Err(AllotError::InvalidQuantity(*quantity));
        }

        let consumer = self.load_consumer(consumer_id).await?;
        let now = self.clock.now();

        // Evaluate every request first; earlier batch items count as held
        let mut planned: Vec<Binding> = Vec::with_capacity(requests.len());
        let mut batch: Vec<HeldEntitlement> = Vec::new();
        for (pool_id, quantity) in requests {
            let pool = self.hydrate_pool(pool_id).await?;
            let mut held = self.held_entitlements(&consumer.id, &pool.product_id).await?;
            held.extend(batch.iter().filter(|h| h.entitlement.product_id == pool.product_id).cloned());

            let warnings = self.evaluate(&consumer, &pool, *quantity, &held, now)?;
            let entitlement =
                Entitlement::new(consumer.id.clone(), pool.id.clone(), pool.product_id.clone(), *quantity, now);

            batch.push(HeldEntitlement { entitlement: entitlement.clone(), pool: Some(pool) });
            planned.push(Binding { entitlement, warnings });
        }

        let mut reservations = Vec::with_capacity(planned.len());
        for binding in &planned {
            reservations.push(self.reserve(&binding.entitlement.pool_id, binding.entitlement.quantity).await?);
        }

        // Commit each reservation as its record lands, so cancellation never
        // leaves a record without quantity or quantity without a record
        let mut persisted: Vec<&Entitlement> = Vec::with_capacity(planned.len());
        for (binding, reservation) in planned.iter().zip(reservations) {
            match self.repos.entitlements.save(&binding.entitlement).await {
                Ok(()) => {
                    reservation.commit();
                    persisted.push(&binding.entitlement);
                }
                Err(e) => {
                    self.roll_back(reservation, &e);
                    self.undo_batch(&persisted).await;
                    return Err(AllotError::PersistenceFailure(e));
                }
            }
        }

        for binding in &planned {
            Counters::inc(&self.counters.binds);
            self.mirror_pool(&binding.entitlement.pool_id).await;
            self.publish(EntitlementEvent::created(&binding.entitlement, now));
        }
        info!(bound = planned.len(), "batch bound");

        Ok(planned)
    }

    /// Remove every entitlement a consumer holds
    #[instrument(skip_all, fields(consumer = %consumer_id))]
    pub async fn unbind_all(&self, consumer_id: &ConsumerId) -> AllotResult<Vec<Entitlement>> {
        let held = self
            .repos
            .entitlements
            .by_consumer(consumer_id)
            .await
            .map_err(AllotError::PersistenceFailure)?;

        let mut removed = Vec::with_capacity(held.len());
        for entitlement in held {
            match self.remove(&entitlement.id, RemovalReason::Unbind).await {
                Ok(e) => removed.push(e),
                // Raced with another unbind
                Err(AllotError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        info!(removed = removed.len(), "unbound all");
        Ok(removed)
    }

    /// Revoke entitlements of pools past their end date and retire the pools
    ///
    /// Also forgets revocation marks older than the configured retention.
    #[instrument(skip_all)]
    pub async fn revoke_expired_pools(&self) -> AllotResult<CleanupReport> {
        let now = self.clock.now();
        let pools = self.repos.pools.list().await.map_err(AllotError::PersistenceFailure)?;
        let mut report = CleanupReport::default();

        for pool in pools.iter().filter(|p| p.is_expired(now)) {
            let entitlements = self
                .repos
                .entitlements
                .by_pool(&pool.id)
                .await
                .map_err(AllotError::PersistenceFailure)?;

            if entitlements.is_empty() && !self.ledger.contains(&pool.id) {
                continue;
            }

            self.ledger.track(pool);
            let mut revoked = 0;
            for entitlement in entitlements {
                match self.remove(&entitlement.id, RemovalReason::PoolExpired).await {
                    Ok(e) => {
                        report.revoked.push(e.id);
                        revoked += 1;
                    }
                    Err(AllotError::NotFound { .. }) => {}
                    Err(e) => return Err(e),
                }
            }

            self.retire_pool(&pool.id).await;

            info!(pool = %pool.id, end = %pool.end, revoked, "expired pool retired");
            self.publish(EntitlementEvent::pool_expired(&pool.id, revoked, now));
            report.expired_pools.push(pool.id.clone());
        }

        if let Some(cutoff) = now.checked_sub_signed(self.config.revocation_retention()) {
            report.pruned_signals = self.revocation.prune(cutoff);
        }
        if report.pruned_signals > 0 {
            debug!(pruned = report.pruned_signals, "revocation marks pruned");
        }

        Ok(report)
    }

    /// Pools of the consumer's organization that would admit one unit now
    ///
    /// Pools passing only with warnings are left out unless `show_all` is set
    /// or the engine is configured to keep them.
    #[instrument(skip_all, fields(consumer = %consumer_id, show_all = show_all))]
    pub async fn available_pools(
        &self,
        consumer_id: &ConsumerId,
        show_all: bool,
    ) -> AllotResult<Vec<AvailablePool>> {
        let consumer = self.load_consumer(consumer_id).await?;
        let pools = self
            .repos
            .pools
            .list_by_owner(&consumer.owner)
            .await
            .map_err(AllotError::PersistenceFailure)?;
        let now = self.clock.now();
        let hide_warned = !show_all && self.config.hide_pools_with_warnings;

        let mut available = Vec::new();
        for pool in &pools {
            let snapshot = self.ledger.snapshot(&pool.id).unwrap_or_else(|_| PoolSnapshot::from(pool));
            let held = self.held_entitlements(&consumer.id, &snapshot.product_id).await?;
            let chain = self.rules.resolve(&snapshot.owner, &snapshot.product_id);
            let ctx = RuleContext { consumer: &consumer, pool: &snapshot, quantity: 1, held: &held, now };

            match chain.evaluate(&ctx) {
                Ok(outcome) if hide_warned && outcome.has_warnings() => {
                    debug!(pool = %snapshot.id, "hidden: passes with warnings");
                }
                Ok(outcome) => available.push(AvailablePool { pool: snapshot, warnings: outcome.warnings }),
                Err(denial) => debug!(pool = %snapshot.id, rule = %denial.rule, "unavailable"),
            }
        }

        Ok(available)
    }

    /// Current accounting of a pool, loading it if untracked
    pub async fn pool_snapshot(&self, pool_id: &PoolId) -> AllotResult<PoolSnapshot> {
        self.hydrate_pool(pool_id).await
    }

    /// Redefine capacity and dates of a pool
    ///
    /// Assumes the caller serializes redefinitions of the same pool.
    #[instrument(skip_all, fields(pool = %pool_id, total = %total))]
    pub async fn update_pool_terms(
        &self,
        pool_id: &PoolId,
        total: Quantity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AllotResult<PoolSnapshot> {
        if start > end {
            return Err(DomainError::InvariantViolation(format!("pool {pool_id} starts after it ends")).into());
        }

        self.hydrate_pool(pool_id).await?;
        let snapshot = self.ledger.update_terms(pool_id, total, start, end)?;
        self.repos
            .pools
            .save(&snapshot.to_pool())
            .await
            .map_err(AllotError::PersistenceFailure)?;

        info!(consumed = snapshot.consumed, overflowing = snapshot.is_overflowing(), "pool terms updated");
        Ok(snapshot)
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStats {
        let c = &self.counters;
        EngineStats {
            binds: c.binds.load(Ordering::Relaxed),
            unbinds: c.unbinds.load(Ordering::Relaxed),
            denials: c.denials.load(Ordering::Relaxed),
            capacity_rejections: c.capacity_rejections.load(Ordering::Relaxed),
            contentions: c.contentions.load(Ordering::Relaxed),
            rollbacks: c.rollbacks.load(Ordering::Relaxed),
            pools_tracked: self.ledger.len(),
            revocations_signalled: self.revocation.signalled_count(),
            rules_version: self.rules.version(),
        }
    }

    async fn remove(&self, entitlement_id: &EntitlementId, reason: RemovalReason) -> AllotResult<Entitlement> {
        let entitlement = self
            .repos
            .entitlements
            .get(entitlement_id)
            .await
            .map_err(|e| lookup_error(e, "entitlement", entitlement_id))?;

        // Track before deleting so the release right after cannot miss
        if let Err(e) = self.hydrate_pool(&entitlement.pool_id).await {
            warn!(pool = %entitlement.pool_id, error = %e, "pool unavailable for release");
        }

        // The delete decides which of two racing unbinds wins
        self.repos
            .entitlements
            .delete(entitlement_id)
            .await
            .map_err(|e| lookup_error(e, "entitlement", entitlement_id))?;

        if let Err(e) = self.ledger.release(&entitlement.pool_id, entitlement.quantity) {
            warn!(pool = %entitlement.pool_id, error = %e, "release skipped");
        }
        Counters::inc(&self.counters.unbinds);

        let now = self.clock.now();
        self.revocation.on_entitlement_removed(&entitlement, reason, now).await;
        info!(entitlement = %entitlement.id, pool = %entitlement.pool_id, ?reason, "unbound");

        self.mirror_pool(&entitlement.pool_id).await;
        self.publish(EntitlementEvent::deleted(&entitlement, reason, now));

        Ok(entitlement)
    }

    async fn undo_batch(&self, persisted: &[&Entitlement]) {
        for entitlement in persisted {
            if let Err(e) = self.repos.entitlements.delete(&entitlement.id).await {
                warn!(entitlement = %entitlement.id, error = %e, "batch undo could not delete");
                continue;
            }
            if let Err(e) = self.ledger.release(&entitlement.pool_id, entitlement.quantity) {
                warn!(pool = %entitlement.pool_id, error = %e, "batch undo could not release");
            }
            Counters::inc(&self.counters.rollbacks);
        }
    }

    async fn load_consumer(&self, consumer_id: &ConsumerId) -> AllotResult<Consumer> {
        self.repos
            .consumers
            .get(consumer_id)
            .await
            .map_err(|e| lookup_error(e, "consumer", consumer_id))
    }

    async fn hydrate_pool(&self, pool_id: &PoolId) -> AllotResult<PoolSnapshot> {
        if let Ok(snapshot) = self.ledger.snapshot(pool_id) {
            return Ok(snapshot);
        }

        let mut pool = self
            .repos
            .pools
            .get(pool_id)
            .await
            .map_err(|e| lookup_error(e, "pool", pool_id))?;

        // Never seed below what persisted entitlements already hold
        let granted: u64 = self
            .repos
            .entitlements
            .by_pool(pool_id)
            .await
            .map_err(AllotError::PersistenceFailure)?
            .iter()
            .map(|e| e.quantity)
            .sum();
        if granted > pool.consumed {
            warn!(pool = %pool_id, stored = pool.consumed, granted, "stored consumed lags entitlements");
            pool.consumed = granted;
        }

        self.ledger.track(&pool);
        self.ledger.snapshot(pool_id)
    }

    async fn held_entitlements(
        &self,
        consumer_id: &ConsumerId,
        product_id: &ProductId,
    ) -> AllotResult<Vec<HeldEntitlement>> {
        let entitlements = self
            .repos
            .entitlements
            .by_consumer_and_product(consumer_id, product_id)
            .await
            .map_err(AllotError::PersistenceFailure)?;

        let mut held = Vec::with_capacity(entitlements.len());
        for entitlement in entitlements {
            let pool = match self.ledger.snapshot(&entitlement.pool_id) {
                Ok(snapshot) => Some(snapshot),
                Err(_) => self
                    .repos
                    .pools
                    .get(&entitlement.pool_id)
                    .await
                    .ok()
                    .map(|p| PoolSnapshot::from(&p)),
            };
            held.push(HeldEntitlement { entitlement, pool });
        }
        Ok(held)
    }

    fn evaluate(
        &self,
        consumer: &Consumer,
        pool: &PoolSnapshot,
        quantity: u64,
        held: &[HeldEntitlement],
        now: DateTime<Utc>,
    ) -> AllotResult<Vec<RuleWarning>> {
        let chain = self.rules.resolve(&pool.owner, &pool.product_id);
        let ctx = RuleContext { consumer, pool, quantity, held, now };

        match chain.evaluate(&ctx) {
            Ok(outcome) => Ok(outcome.warnings),
            // A quantity denial is a capacity shortfall seen early
            Err(denial) if denial.rule == QUANTITY => {
                Counters::inc(&self.counters.capacity_rejections);
                debug!(reason = %denial.reason, "capacity exceeded at evaluation");
                Err(AllotError::CapacityExceeded {
                    pool: pool.id.clone(),
                    requested: quantity,
                    available: pool.remaining().unwrap_or(u64::MAX),
                })
            }
            Err(denial) => {
                Counters::inc(&self.counters.denials);
                warn!(rule = %denial.rule, reason = %denial.reason, "bind denied");
                Err(denial.into())
            }
        }
    }

    /// Bounded CAS retries; between lost races the task yields to the
    /// runtime, or sleeps the configured backoff, instead of blocking a worker
    async fn reserve(&self, pool_id: &PoolId, quantity: u64) -> AllotResult<Reservation> {
        let attempts = self.config.max_reserve_attempts;
        let backoff = self.config.contention_backoff();

        for attempt in 1..=attempts {
            match self.ledger.try_reserve(pool_id, quantity) {
                Ok(Some(reservation)) => return Ok(reservation),
                Ok(None) => {}
                Err(e) => {
                    if matches!(e, AllotError::CapacityExceeded { .. }) {
                        Counters::inc(&self.counters.capacity_rejections);
                    }
                    return Err(e);
                }
            }
            if attempt == attempts {
                break;
            }
            if backoff.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(backoff).await;
            }
        }

        Counters::inc(&self.counters.contentions);
        warn!(pool = %pool_id, attempts, "reservation contention");
        Err(AllotError::Contention { pool: pool_id.clone(), attempts })
    }

    fn roll_back(&self, reservation: Reservation, cause: &RepositoryError) {
        warn!(
            pool = %reservation.pool_id(),
            quantity = reservation.quantity(),
            error = %cause,
            "persistence failed, rolling back reservation"
        );
        reservation.rollback();
        Counters::inc(&self.counters.rollbacks);
    }

    fn mirror_lock(&self, pool_id: &PoolId) -> Arc<Mutex<()>> {
        Arc::clone(self.mirror_locks.entry(pool_id.clone()).or_default().value())
    }

    /// Best effort: the ledger stays authoritative if the store lags
    ///
    /// The snapshot is taken under the pool's mirror lock, so the last write
    /// to land always carries the newest counter.
    async fn mirror_pool(&self, pool_id: &PoolId) {
        let lock = self.mirror_lock(pool_id);
        let _guard = lock.lock().await;

        let Ok(snapshot) = self.ledger.snapshot(pool_id) else {
            return;
        };
        if let Err(e) = self.repos.pools.save(&snapshot.to_pool()).await {
            warn!(pool = %pool_id, error = %e, "pool mirror failed");
        }
    }

    async fn retire_pool(&self, pool_id: &PoolId) {
        let lock = self.mirror_lock(pool_id);
        {
            let _guard = lock.lock().await;
            if let Some(last) = self.ledger.retire(pool_id) {
                if let Err(e) = self.repos.pools.save(&last.to_pool()).await {
                    warn!(pool = %pool_id, error = %e, "pool mirror failed");
                }
            }
        }
        self.mirror_locks.remove(pool_id);
    }

    fn publish(&self, event: EntitlementEvent) {
        if self.config.audit_events {
            self.audit.publish(event);
        }
    }
}

impl fmt::Debug for EntitlementEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitlementEngine")
            .field("config", &self.config)
            .field("pools_tracked", &self.ledger.len())
            .finish()
    }
}

fn lookup_error(err: RepositoryError, kind: &'static str, id: impl fmt::Display) -> AllotError {
    match err {
        RepositoryError::NotFound(_) => AllotError::NotFound { kind, id: id.to_string() },
        other => AllotError::PersistenceFailure(other),
    }
}
