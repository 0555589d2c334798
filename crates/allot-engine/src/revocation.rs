//! Revocation Coordinator
//!
//! Turns entitlement removals into revocation intents for the certificate
//! subsystem. Each entitlement id is signalled at most once, however many
//! times removal is reported.

use allot_common::{ConsumerId, Entitlement, EntitlementId, PoolId, RemovalReason, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Request to invalidate whatever was issued for one entitlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationIntent {
    pub entitlement_id: EntitlementId,
    pub consumer_id: ConsumerId,
    pub pool_id: PoolId,
    pub certificate_serial: Option<u64>,
    pub reason: RemovalReason,
    pub requested_at: DateTime<Utc>,
}

impl RevocationIntent {
    fn for_entitlement(entitlement: &Entitlement, reason: RemovalReason, at: DateTime<Utc>) -> Self {
        Self {
            entitlement_id: entitlement.id,
            consumer_id: entitlement.consumer_id.clone(),
            pool_id: entitlement.pool_id.clone(),
            certificate_serial: entitlement.certificate_serial,
            reason,
            requested_at: at,
        }
    }
}

/// Certificate/CRL subsystem port
#[async_trait]
pub trait RevocationSink: Send + Sync {
    /// Accept an intent; delivery and retry are the sink's concern
    async fn revoke(&self, intent: RevocationIntent) -> Result<(), RepositoryError>;
}

/// Sink that queues intents in memory until drained
#[derive(Debug, Default)]
pub struct QueuedRevocationSink {
    queue: Mutex<VecDeque<RevocationIntent>>,
}

impl QueuedRevocationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued intent in arrival order
    pub fn drain(&self) -> Vec<RevocationIntent> {
        self.queue.lock().drain(..).collect()
    }

    /// Number of queued intents
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[async_trait]
impl RevocationSink for QueuedRevocationSink {
    async fn revoke(&self, intent: RevocationIntent) -> Result<(), RepositoryError> {
        self.queue.lock().push_back(intent);
        Ok(())
    }
}

/// Exactly-once gate in front of a [`RevocationSink`]
pub struct RevocationCoordinator {
    sink: Arc<dyn RevocationSink>,
    /// Signal time per id; the engine's expired-pool sweep prunes old marks
    signalled: DashMap<EntitlementId, DateTime<Utc>>,
}

impl RevocationCoordinator {
    pub fn new(sink: Arc<dyn RevocationSink>) -> Self {
        Self { sink, signalled: DashMap::new() }
    }

    /// Signal removal of `entitlement`
    ///
    /// Returns `true` if this call delivered the intent, `false` if the id was
    /// already signalled. Sink failures are logged, not returned: the removal
    /// has already committed and the id stays marked.
    pub async fn on_entitlement_removed(
        &self,
        entitlement: &Entitlement,
        reason: RemovalReason,
        at: DateTime<Utc>,
    ) -> bool {
        let first = match self.signalled.entry(entitlement.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(at);
                true
            }
        };

        if !first {
            debug!(entitlement = %entitlement.id, "revocation already signalled");
            return false;
        }

        let intent = RevocationIntent::for_entitlement(entitlement, reason, at);
        match self.sink.revoke(intent).await {
            Ok(()) => {
                info!(
                    entitlement = %entitlement.id,
                    consumer = %entitlement.consumer_id,
                    serial = ?entitlement.certificate_serial,
                    ?reason,
                    "revocation signalled"
                );
            }
            Err(e) => {
                warn!(entitlement = %entitlement.id, error = %e, "revocation sink rejected intent");
            }
        }
        true
    }

    /// Whether an id has been signalled
    pub fn was_signalled(&self, id: &EntitlementId) -> bool {
        self.signalled.contains_key(id)
    }

    /// Number of remembered ids
    pub fn signalled_count(&self) -> usize {
        self.signalled.len()
    }

    /// Forget ids signalled before `cutoff`; returns how many were dropped
    pub fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.signalled.len();
        self.signalled.retain(|_, at| *at >= cutoff);
        before - self.signalled.len()
    }
}

impl std::fmt::Debug for RevocationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationCoordinator")
            .field("signalled", &self.signalled.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allot_common::ProductId;
    use chrono::Duration;

    struct BrokenSink;

    #[async_trait]
    impl RevocationSink for BrokenSink {
        async fn revoke(&self, _intent: RevocationIntent) -> Result<(), RepositoryError> {
            Err(RepositoryError::StorageError("crl unavailable".into()))
        }
    }

    fn entitlement() -> Entitlement {
        let mut ent = Entitlement::new(
            ConsumerId::new("c1").unwrap(),
            PoolId::new("p1").unwrap(),
            ProductId::new("rhel").unwrap(),
            1,
            Utc::now(),
        );
        ent.certificate_serial = Some(4021);
        ent
    }

    #[tokio::test]
    async fn test_signals_once_per_entitlement() {
        let sink = Arc::new(QueuedRevocationSink::new());
        let coordinator = RevocationCoordinator::new(sink.clone());
        let ent = entitlement();

        assert!(coordinator.on_entitlement_removed(&ent, RemovalReason::Unbind, Utc::now()).await);
        assert!(!coordinator.on_entitlement_removed(&ent, RemovalReason::Unbind, Utc::now()).await);

        let intents = sink.drain();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].entitlement_id, ent.id);
        assert_eq!(intents[0].certificate_serial, Some(4021));
        assert!(sink.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reports_deliver_once() {
        let sink = Arc::new(QueuedRevocationSink::new());
        let coordinator = Arc::new(RevocationCoordinator::new(sink.clone()));
        let ent = entitlement();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let ent = ent.clone();
                tokio::spawn(async move {
                    coordinator.on_entitlement_removed(&ent, RemovalReason::Unbind, Utc::now()).await
                })
            })
            .collect();

        let mut delivered = 0;
        for task in tasks {
            if task.await.unwrap() {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 1);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_still_marks() {
        let coordinator = RevocationCoordinator::new(Arc::new(BrokenSink));
        let ent = entitlement();

        assert!(coordinator.on_entitlement_removed(&ent, RemovalReason::PoolExpired, Utc::now()).await);
        assert!(coordinator.was_signalled(&ent.id));
    }

    #[tokio::test]
    async fn test_prune() {
        let coordinator = RevocationCoordinator::new(Arc::new(QueuedRevocationSink::new()));
        let now = Utc::now();

        let old = entitlement();
        let recent = entitlement();
        coordinator.on_entitlement_removed(&old, RemovalReason::Unbind, now - Duration::days(10)).await;
        coordinator.on_entitlement_removed(&recent, RemovalReason::Unbind, now).await;

        assert_eq!(coordinator.prune(now - Duration::days(1)), 1);
        assert!(!coordinator.was_signalled(&old.id));
        assert_eq!(coordinator.signalled_count(), 1);
    }
}
