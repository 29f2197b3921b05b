use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::SyncNotice;

/// In-process fan-out of user-facing notices.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    sender: Arc<broadcast::Sender<SyncNotice>>,
}

impl NoticeBus {
    /// Create a new bus with the given channel capacity. A capacity of zero
    /// is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish a notice to all current subscribers.
    pub fn publish(
        &self,
        notice: SyncNotice,
    ) -> Result<usize, broadcast::error::SendError<SyncNotice>> {
        self.sender.send(notice)
    }

    /// Subscribe to notices published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = NoticeBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(SyncNotice::TaskCompleted {
            title: "Setup chairs".into(),
        })
        .unwrap();

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.message(), "Task \"Setup chairs\" completed!");
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = NoticeBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(SyncNotice::EventCreated { name: "Launch".into() }).unwrap();

        assert!(matches!(rx1.recv().await.unwrap(), SyncNotice::EventCreated { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), SyncNotice::EventCreated { .. }));
    }

    #[tokio::test]
    async fn zero_capacity_still_delivers() {
        let bus = NoticeBus::new(0);
        let mut rx = bus.subscribe();

        bus.publish(SyncNotice::TaskDeleted { id: "9".into() }).unwrap();

        assert!(matches!(rx.recv().await.unwrap(), SyncNotice::TaskDeleted { .. }));
    }

    #[test]
    fn publishing_without_subscribers_is_reported() {
        let bus = NoticeBus::default();
        assert!(bus.publish(SyncNotice::TaskDeleted { id: "1".into() }).is_err());
    }
}
