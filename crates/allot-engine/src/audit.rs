//! Audit feed
//!
//! Outbound notification of committed changes. Publishing never fails the
//! operation that produced the event.

use allot_common::EntitlementEvent;
use allot_common::DomainEvent;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Receiving half handed to the audit collaborator
pub type AuditReceiver = mpsc::UnboundedReceiver<EntitlementEvent>;

/// Publisher of [`EntitlementEvent`]s
#[derive(Debug, Clone, Default)]
pub struct AuditFeed {
    tx: Option<mpsc::UnboundedSender<EntitlementEvent>>,
}

impl AuditFeed {
    /// Feed backed by a fresh channel
    pub fn channel() -> (Self, AuditReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Feed that drops everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether events go anywhere
    pub fn is_enabled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Publish after commit
    pub fn publish(&self, event: EntitlementEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        let event_type = event.event_type();
        if tx.send(event).is_err() {
            warn!(event_type, "audit receiver closed, event dropped");
        } else {
            trace!(event_type, "audit event published");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allot_common::{ConsumerId, Entitlement, PoolId, ProductId, RemovalReason};
    use chrono::Utc;

    fn entitlement() -> Entitlement {
        Entitlement::new(
            ConsumerId::new("c1").unwrap(),
            PoolId::new("p1").unwrap(),
            ProductId::new("rhel").unwrap(),
            1,
            Utc::now(),
        )
    }

    #[test]
    fn test_publish_in_order() {
        let (feed, mut rx) = AuditFeed::channel();
        let ent = entitlement();

        feed.publish(EntitlementEvent::created(&ent, Utc::now()));
        feed.publish(EntitlementEvent::deleted(&ent, RemovalReason::Unbind, Utc::now()));

        assert_eq!(rx.try_recv().unwrap().event_type(), "entitlement.created");
        assert_eq!(rx.try_recv().unwrap().event_type(), "entitlement.deleted");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (feed, rx) = AuditFeed::channel();
        drop(rx);
        assert!(!feed.is_enabled());
        feed.publish(EntitlementEvent::created(&entitlement(), Utc::now()));

        let disabled = AuditFeed::disabled();
        assert!(!disabled.is_enabled());
        disabled.publish(EntitlementEvent::created(&entitlement(), Utc::now()));
    }
}
