//! Pool Ledger - capacity accounting
//!
//! The only place consumed quantity changes. Each pool has its own account:
//! the consumed counter is an atomic updated by compare-and-swap, the pool's
//! terms (capacity, dates, attributes) sit behind an `ArcSwap` so readers
//! never block. Different pools never contend.

use allot_common::{
    AllotError, AllotResult, OwnerId, Pool, PoolId, PoolSnapshot, ProductId, Quantity,
};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pool terms; replaced wholesale, never mutated in place
#[derive(Debug, Clone)]
struct PoolTerms {
    owner: OwnerId,
    product_id: ProductId,
    total: Quantity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
}

impl From<&Pool> for PoolTerms {
    fn from(pool: &Pool) -> Self {
        Self {
            owner: pool.owner.clone(),
            product_id: pool.product_id.clone(),
            total: pool.quantity,
            start: pool.start,
            end: pool.end,
            attributes: pool.attributes.clone(),
        }
    }
}

/// Per-pool account
#[derive(Debug)]
struct PoolAccount {
    id: PoolId,
    terms: ArcSwap<PoolTerms>,
    consumed: AtomicU64,
}

impl PoolAccount {
    fn snapshot(&self) -> PoolSnapshot {
        let terms = self.terms.load();
        PoolSnapshot {
            id: self.id.clone(),
            owner: terms.owner.clone(),
            product_id: terms.product_id.clone(),
            total: terms.total,
            consumed: self.consumed.load(Ordering::Acquire),
            start: terms.start,
            end: terms.end,
            attributes: terms.attributes.clone(),
        }
    }

    /// Lock-free decrement, saturating at zero
    fn release(&self, quantity: u64) -> u64 {
        let previous = self
            .consumed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_sub(quantity)))
            .unwrap_or_else(|c| c);
        if previous < quantity {
            warn!(pool = %self.id, previous, quantity, "release exceeded consumed quantity");
        }
        previous.saturating_sub(quantity)
    }
}

/// Quantity held against a pool until committed
///
/// Dropping an uncommitted reservation releases it. This is how a bind that
/// fails (or is cancelled) after reserving gives the quantity back.
#[must_use = "dropping a reservation releases it"]
#[derive(Debug)]
pub struct Reservation {
    account: Arc<PoolAccount>,
    quantity: u64,
    committed: bool,
}

impl Reservation {
    /// Pool the quantity was reserved from
    pub fn pool_id(&self) -> &PoolId {
        &self.account.id
    }

    /// Reserved quantity
    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// Make the reservation permanent; the quantity now backs an entitlement
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Give the quantity back explicitly
    pub fn rollback(self) {
        drop(self);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            let consumed = self.account.release(self.quantity);
            debug!(pool = %self.account.id, quantity = self.quantity, consumed, "reservation rolled back");
        }
    }
}

/// Authoritative capacity record for every tracked pool
pub struct PoolLedger {
    accounts: DashMap<PoolId, Arc<PoolAccount>>,
    max_attempts: u32,
}

impl PoolLedger {
    /// Ledger allowing `max_attempts` CAS attempts per blocking reservation
    pub fn new(max_attempts: u32) -> Self {
        Self {
            accounts: DashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Start tracking a pool, seeding the counter from its stored consumed
    /// quantity. An already tracked pool keeps its counter; returns whether
    /// the pool was newly tracked.
    pub fn track(&self, pool: &Pool) -> bool {
        let mut inserted = false;
        self.accounts.entry(pool.id.clone()).or_insert_with(|| {
            inserted = true;
            Arc::new(PoolAccount {
                id: pool.id.clone(),
                terms: ArcSwap::from_pointee(PoolTerms::from(pool)),
                consumed: AtomicU64::new(pool.consumed),
            })
        });
        if inserted {
            debug!(pool = %pool.id, total = %pool.quantity, consumed = pool.consumed, "tracking pool");
        }
        inserted
    }

    /// Redefine capacity and dates of a tracked pool
    ///
    /// Callers serialize these updates externally. Cutting capacity below the
    /// consumed quantity is allowed; the snapshot then reports overflow.
    pub fn update_terms(
        &self,
        pool_id: &PoolId,
        total: Quantity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AllotResult<PoolSnapshot> {
        let account = self.account(pool_id)?;
        let mut terms = PoolTerms::clone(&account.terms.load());
        terms.total = total;
        terms.start = start;
        terms.end = end;
        account.terms.store(Arc::new(terms));

        let snapshot = account.snapshot();
        if snapshot.is_overflowing() {
            warn!(pool = %pool_id, total = %total, consumed = snapshot.consumed, "pool is overflowing");
        }
        Ok(snapshot)
    }

    /// Stop tracking a pool; returns its final snapshot
    pub fn retire(&self, pool_id: &PoolId) -> Option<PoolSnapshot> {
        self.accounts.remove(pool_id).map(|(_, account)| account.snapshot())
    }

    /// Whether a pool is tracked
    pub fn contains(&self, pool_id: &PoolId) -> bool {
        self.accounts.contains_key(pool_id)
    }

    /// Number of tracked pools
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Read-only view for rules
    pub fn snapshot(&self, pool_id: &PoolId) -> AllotResult<PoolSnapshot> {
        Ok(self.account(pool_id)?.snapshot())
    }

    /// One compare-and-swap attempt at adding `quantity` to consumed
    ///
    /// `Ok(None)` means another writer changed the counter between the load
    /// and the swap; the caller decides whether and how to retry. Never
    /// blocks, so async callers can back off on their own timer.
    pub fn try_reserve(&self, pool_id: &PoolId, quantity: u64) -> AllotResult<Option<Reservation>> {
        let account = self.account(pool_id)?;
        let current = account.consumed.load(Ordering::Acquire);
        let total = account.terms.load().total;

        if !total.admits(current, quantity) {
            return Err(AllotError::CapacityExceeded {
                pool: pool_id.clone(),
                requested: quantity,
                available: total.remaining(current).unwrap_or(u64::MAX),
            });
        }

        let next = current.saturating_add(quantity);
        if account
            .consumed
            .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }

        debug!(pool = %pool_id, quantity, consumed = next, "reserved");
        Ok(Some(Reservation { account, quantity, committed: false }))
    }

    /// Atomically add `quantity` to consumed if it fits
    ///
    /// Fails with `CapacityExceeded` when the pool lacks room at the instant
    /// of the check, or `Contention` after the configured number of lost
    /// compare-and-swap races. Retries spin without sleeping; async callers
    /// use [`PoolLedger::try_reserve`] with their own backoff instead.
    pub fn reserve(&self, pool_id: &PoolId, quantity: u64) -> AllotResult<Reservation> {
        for _ in 0..self.max_attempts {
            if let Some(reservation) = self.try_reserve(pool_id, quantity)? {
                return Ok(reservation);
            }
            std::hint::spin_loop();
        }

        warn!(pool = %pool_id, attempts = self.max_attempts, "reservation contention");
        Err(AllotError::Contention { pool: pool_id.clone(), attempts: self.max_attempts })
    }

    /// Atomically subtract `quantity` from consumed; returns the new value
    pub fn release(&self, pool_id: &PoolId, quantity: u64) -> AllotResult<u64> {
        let account = self.account(pool_id)?;
        let consumed = account.release(quantity);
        debug!(pool = %pool_id, quantity, consumed, "released");
        Ok(consumed)
    }

    fn account(&self, pool_id: &PoolId) -> AllotResult<Arc<PoolAccount>> {
        self.accounts
            .get(pool_id)
            .map(|a| Arc::clone(a.value()))
            .ok_or_else(|| AllotError::pool_not_found(pool_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::thread;

    fn pool(id: &str, total: Quantity) -> Pool {
        let now = Utc::now();
        Pool::new(
            PoolId::new(id).unwrap(),
            OwnerId::new("acme").unwrap(),
            ProductId::new("rhel").unwrap(),
            total,
            now - ChronoDuration::days(1),
            now + ChronoDuration::days(1),
        )
        .unwrap()
    }

    fn ledger() -> PoolLedger {
        PoolLedger::new(64)
    }

    #[test]
    fn test_reserve_until_full() {
        let ledger = ledger();
        let p = pool("p1", Quantity::Limited(10));
        ledger.track(&p);

        for _ in 0..10 {
            ledger.reserve(&p.id, 1).unwrap().commit();
        }

        let err = ledger.reserve(&p.id, 1).unwrap_err();
        assert!(matches!(err, AllotError::CapacityExceeded { available: 0, .. }));
        assert_eq!(ledger.snapshot(&p.id).unwrap().consumed, 10);
    }

    #[test]
    fn test_dropped_reservation_releases() {
        let ledger = ledger();
        let p = pool("p1", Quantity::Limited(5));
        ledger.track(&p);

        let reservation = ledger.reserve(&p.id, 3).unwrap();
        assert_eq!(reservation.quantity(), 3);
        assert_eq!(ledger.snapshot(&p.id).unwrap().consumed, 3);

        drop(reservation);
        assert_eq!(ledger.snapshot(&p.id).unwrap().consumed, 0);

        ledger.reserve(&p.id, 2).unwrap().rollback();
        assert_eq!(ledger.snapshot(&p.id).unwrap().consumed, 0);
    }

    #[test]
    fn test_release_saturates() {
        let ledger = ledger();
        let p = pool("p1", Quantity::Limited(5));
        ledger.track(&p);
        ledger.reserve(&p.id, 2).unwrap().commit();

        assert_eq!(ledger.release(&p.id, 1).unwrap(), 1);
        assert_eq!(ledger.release(&p.id, 5).unwrap(), 0);
    }

    #[test]
    fn test_unlimited_pool() {
        let ledger = ledger();
        let p = pool("p1", Quantity::Unlimited);
        ledger.track(&p);
        ledger.reserve(&p.id, 1_000_000).unwrap().commit();
        assert_eq!(ledger.snapshot(&p.id).unwrap().remaining(), None);
    }

    #[test]
    fn test_unknown_pool() {
        let ledger = ledger();
        let id = PoolId::new("ghost").unwrap();
        assert!(matches!(ledger.reserve(&id, 1), Err(AllotError::NotFound { kind: "pool", .. })));
        assert!(ledger.release(&id, 1).is_err());
    }

    #[test]
    fn test_try_reserve_single_attempt() {
        let ledger = ledger();
        let p = pool("p1", Quantity::Limited(2));
        ledger.track(&p);

        ledger.try_reserve(&p.id, 2).unwrap().unwrap().commit();
        assert!(matches!(
            ledger.try_reserve(&p.id, 1),
            Err(AllotError::CapacityExceeded { requested: 1, available: 0, .. })
        ));
        assert_eq!(ledger.snapshot(&p.id).unwrap().consumed, 2);
    }

    #[test]
    fn test_track_keeps_live_counter() {
        let ledger = ledger();
        let mut p = pool("p1", Quantity::Limited(5));
        assert!(ledger.track(&p));
        ledger.reserve(&p.id, 4).unwrap().commit();

        p.consumed = 0;
        assert!(!ledger.track(&p));
        assert_eq!(ledger.snapshot(&p.id).unwrap().consumed, 4);
    }

    #[test]
    fn test_capacity_cut_overflows() {
        let ledger = ledger();
        let p = pool("p1", Quantity::Limited(10));
        ledger.track(&p);
        ledger.reserve(&p.id, 8).unwrap().commit();

        let snap = ledger.update_terms(&p.id, Quantity::Limited(5), p.start, p.end).unwrap();
        assert!(snap.is_overflowing());
        assert!(ledger.reserve(&p.id, 1).is_err());

        ledger.release(&p.id, 4).unwrap();
        ledger.reserve(&p.id, 1).unwrap().commit();
    }

    #[test]
    fn test_retire() {
        let ledger = ledger();
        let p = pool("p1", Quantity::Limited(10));
        ledger.track(&p);
        let reservation = ledger.reserve(&p.id, 2).unwrap();

        let last = ledger.retire(&p.id).unwrap();
        assert_eq!(last.consumed, 2);
        assert!(!ledger.contains(&p.id));

        // Outstanding reservations still roll back against their account
        drop(reservation);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_total() {
        let ledger = Arc::new(ledger());
        let p = pool("p1", Quantity::Limited(100));
        ledger.track(&p);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let id = p.id.clone();
                thread::spawn(move || {
                    let mut granted = 0u64;
                    for _ in 0..50 {
                        match ledger.reserve(&id, 1) {
                            Ok(r) => {
                                r.commit();
                                granted += 1;
                            }
                            Err(AllotError::CapacityExceeded { .. }) | Err(AllotError::Contention { .. }) => {}
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    granted
                })
            })
            .collect();

        let granted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let snap = ledger.snapshot(&p.id).unwrap();
        assert_eq!(snap.consumed, granted);
        assert!(granted <= 100);
    }

    #[test]
    fn test_contention_after_bounded_attempts() {
        let ledger = Arc::new(PoolLedger::new(1));
        let p = pool("p1", Quantity::Unlimited);
        ledger.track(&p);

        // With one attempt, some reservations under heavy contention may fail
        // with Contention, but none may be lost or double counted.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let id = p.id.clone();
                thread::spawn(move || {
                    let mut ok = 0u64;
                    for _ in 0..500 {
                        match ledger.reserve(&id, 1) {
                            Ok(r) => {
                                r.commit();
                                ok += 1;
                            }
                            Err(AllotError::Contention { attempts, .. }) => assert_eq!(attempts, 1),
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    ok
                })
            })
            .collect();

        let ok: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(ledger.snapshot(&p.id).unwrap().consumed, ok);
    }
}
