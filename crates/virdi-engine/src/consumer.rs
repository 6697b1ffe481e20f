//! Consumers and their pre-delivery buffers.

use crate::buffer::Buffer;
use crate::notify::Notifier;
use crate::resource::Resource;
use std::sync::Arc;
use tracing::warn;

/// A registered consumer of one resource.
///
/// The consumer owns a local buffer of pre-delivered units. It references its
/// resource by id only; callers resolve the [`Resource`] through the engine,
/// which keeps the resource→consumer ownership one-directional.
#[derive(Debug)]
pub struct Consumer {
    id: String,
    resource_id: String,
    buffer: Buffer,
    max_rate: Option<u32>,
    notifier: Option<Notifier>,
}

impl Consumer {
    /// Creates a new consumer. Prefer the engine's `create_consumer`, which
    /// also registers the consumer and attaches it to its resource.
    pub fn new(
        id: impl Into<String>,
        resource_id: impl Into<String>,
        buffer_limit: u64,
        max_rate: Option<u32>,
        notifier: Option<Notifier>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_id: resource_id.into(),
            buffer: Buffer::new(buffer_limit),
            max_rate,
            notifier,
        }
    }

    /// The identifier of the consumer.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The id of the resource this consumer consumes. Immutable for the
    /// consumer's lifetime.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// The local pre-delivery buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// The declared maximum consumption rate in units per minute, if any.
    pub fn max_rate(&self) -> Option<u32> {
        self.max_rate
    }

    /// Returns `true` if the consumer is notifier-backed. Such consumers
    /// must not be drained through the manual admin path.
    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    /// Adds units to the local buffer; returns how many were actually added.
    pub async fn add(&self, amount: u64) -> u64 {
        self.buffer.add(amount).await
    }

    /// Removes up to `amount` units, preferring the resource's global buffer
    /// and taking the residual from the local buffer. Draining the shared
    /// pool first leaves the most headroom for other consumers.
    ///
    /// Returns the total actually removed.
    pub async fn remove(&self, resource: &Resource, amount: u64) -> u64 {
        let from_global = resource.remove(amount).await;
        let from_local = self.buffer.remove(amount - from_global).await;
        from_global + from_local
    }

    /// Drains everything from the global and local buffers.
    pub async fn remove_all(&self, resource: &Resource) -> u64 {
        resource.remove_all().await + self.buffer.remove_all().await
    }

    /// Announces the current local buffer content to the consumer's owner.
    ///
    /// Under the notifier's exclusion scope: read the buffered amount, hand
    /// it to the notifier, then remove the take it reports. A take beyond
    /// what the buffer holds is clamped and logged. Without a notifier this
    /// is a no-op; the consumer is then in manual pull mode.
    ///
    /// Only this path removes units from a notifier-backed consumer.
    pub async fn notify(&self) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };

        let _scope = notifier.exclusion().lock().await;

        let available = self.buffer.amount().await;
        if available == 0 {
            return;
        }

        match notifier.notify(available, &self.id).await {
            Ok(0) => {}
            Ok(taken) => {
                let removed = self.buffer.remove(taken).await;
                if removed < taken {
                    warn!(
                        consumer = %self.id,
                        taken,
                        removed,
                        "notifier took more than the buffer held"
                    );
                }
            }
            Err(error) => {
                warn!(
                    consumer = %self.id,
                    notifier = notifier.kind(),
                    %error,
                    "notification failed, keeping buffered units"
                );
            }
        }
    }

    /// Fire-and-forget [`notify`](Self::notify): the notification runs as a
    /// detached task so distribution never blocks on a slow notifier.
    pub fn notify_detached(self: &Arc<Self>) {
        if self.notifier.is_none() {
            return;
        }
        let consumer = Arc::clone(self);
        tokio::spawn(async move { consumer.notify().await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Notify, NotifyError};

    /// Reports a take larger than anything the buffer can hold.
    struct OverdrawNotifier;

    impl Notify for OverdrawNotifier {
        async fn notify(&self, amount: u64, _consumer_id: &str) -> Result<u64, NotifyError> {
            Ok(amount + 10)
        }

        fn kind(&self) -> &str {
            "overdraw"
        }
    }

    /// Always fails; the buffer must stay untouched.
    struct FailingNotifier;

    impl Notify for FailingNotifier {
        async fn notify(&self, _amount: u64, _consumer_id: &str) -> Result<u64, NotifyError> {
            Err(NotifyError::Status(500))
        }

        fn kind(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn notify_without_notifier_is_a_no_op() {
        let consumer = Consumer::new("c1", "iron", 50, None, None);
        consumer.add(20).await;
        consumer.notify().await;
        assert_eq!(consumer.buffer().amount().await, 20);
    }

    #[tokio::test]
    async fn debug_notifier_drains_the_buffer() {
        let consumer = Consumer::new("c1", "iron", 50, None, Some(Notifier::debug()));
        consumer.add(20).await;
        consumer.notify().await;
        assert_eq!(consumer.buffer().amount().await, 0);
    }

    #[tokio::test]
    async fn overdrawing_take_is_clamped() {
        let notifier = Notifier::new(Box::new(OverdrawNotifier));
        let consumer = Consumer::new("c1", "iron", 50, None, Some(notifier));
        consumer.add(20).await;
        consumer.notify().await;
        assert_eq!(consumer.buffer().amount().await, 0);
    }

    #[tokio::test]
    async fn failed_notification_keeps_the_buffer() {
        let notifier = Notifier::new(Box::new(FailingNotifier));
        let consumer = Consumer::new("c1", "iron", 50, None, Some(notifier));
        consumer.add(20).await;
        consumer.notify().await;
        assert_eq!(consumer.buffer().amount().await, 20);
    }

    #[tokio::test]
    async fn remove_prefers_the_global_buffer() {
        let resource = Resource::new("iron", 100);
        resource.buffer().add(30).await;

        let consumer = Consumer::new("c1", "iron", 50, None, None);
        consumer.add(40).await;

        // 30 from the global pool, 20 from the local buffer.
        assert_eq!(consumer.remove(&resource, 50).await, 50);
        assert_eq!(resource.buffer().amount().await, 0);
        assert_eq!(consumer.buffer().amount().await, 20);
    }

    #[tokio::test]
    async fn remove_reports_what_was_actually_there() {
        let resource = Resource::new("iron", 100);
        let consumer = Consumer::new("c1", "iron", 50, None, None);
        consumer.add(5).await;
        assert_eq!(consumer.remove(&resource, 50).await, 5);
    }

    #[tokio::test]
    async fn remove_all_unions_both_buffers() {
        let resource = Resource::new("iron", 100);
        resource.buffer().add(12).await;
        let consumer = Consumer::new("c1", "iron", 50, None, None);
        consumer.add(8).await;
        assert_eq!(consumer.remove_all(&resource).await, 20);
        assert_eq!(resource.buffer().amount().await, 0);
        assert_eq!(consumer.buffer().amount().await, 0);
    }
}
