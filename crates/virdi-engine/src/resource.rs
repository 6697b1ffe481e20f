//! Resources: the global buffer, the attached consumers, and the demand
//! events that wake producers.

use crate::buffer::Buffer;
use crate::consumer::Consumer;
use crate::distribute::{distribute, Distribution};
use crate::event::Event;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// A named category of fungible units managed by the broker.
///
/// Owns the global buffer (the shared pool), the set of attached consumers,
/// and one demand event per active producer stream. Resources are created at
/// config load and live for the whole process.
#[derive(Debug)]
pub struct Resource {
    id: String,
    buffer: Buffer,
    consumers: Mutex<Vec<Arc<Consumer>>>,
    demand_events: Mutex<Vec<Arc<Event>>>,
}

impl Resource {
    /// Creates a new resource with an empty global buffer.
    pub fn new(id: impl Into<String>, buffer_limit: u64) -> Self {
        let id = id.into();
        info!(resource = %id, buffer_limit, "creating resource");
        Self {
            id,
            buffer: Buffer::new(buffer_limit),
            consumers: Mutex::new(Vec::new()),
            demand_events: Mutex::new(Vec::new()),
        }
    }

    /// The identifier of the resource.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The global buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Delivers `amount` produced units into the resource.
    ///
    /// The units are first spread across the attached consumers; the
    /// remainder spills into the global buffer. Every consumer that gained
    /// units is notified on a detached task.
    ///
    /// Returns the keep-coming flag: `true` as long as the broker can take
    /// more of this resource.
    pub async fn add(&self, amount: u64) -> bool {
        let snapshot: Vec<Arc<Consumer>> = self.consumers.lock().clone();

        let Distribution {
            keep_coming,
            affected,
        } = distribute(amount, &snapshot, Some(&self.buffer)).await;

        for consumer in &affected {
            consumer.notify_detached();
        }

        keep_coming
    }

    /// Removes up to `amount` units from the global buffer and returns the
    /// amount actually removed.
    ///
    /// A full→not-full transition signals every registered demand event so
    /// waiting producers resume.
    pub async fn remove(&self, amount: u64) -> u64 {
        let mut slot = self.buffer.lock().await;
        let full_before = self.buffer.is_full_locked(&slot);
        let removed = self.buffer.remove_locked(&mut slot, amount);
        let full_after = self.buffer.is_full_locked(&slot);
        drop(slot);

        if full_before && !full_after {
            self.signal_demand();
        }

        removed
    }

    /// Empties the global buffer, with the same demand signalling as
    /// [`remove`](Self::remove).
    pub async fn remove_all(&self) -> u64 {
        let mut slot = self.buffer.lock().await;
        let full_before = self.buffer.is_full_locked(&slot);
        let removed = self.buffer.remove_all_locked(&mut slot);
        drop(slot);

        if full_before && removed > 0 {
            self.signal_demand();
        }

        removed
    }

    /// Adds the consumer to the distribution set.
    ///
    /// Anything already waiting in the global buffer is drained into the
    /// newcomer up to its buffer limit, followed by a notification, so a
    /// consumer never sits idle next to a stocked pool.
    pub async fn attach_consumer(&self, consumer: Arc<Consumer>) {
        self.consumers.lock().push(Arc::clone(&consumer));

        let mut global = self.buffer.lock().await;
        if *global > 0 {
            let full_before = self.buffer.is_full_locked(&global);
            let mut local = consumer.buffer().lock().await;
            let moved = consumer.buffer().add_locked(&mut local, *global);
            self.buffer.remove_locked(&mut global, moved);
            drop(local);
            let full_after = self.buffer.is_full_locked(&global);
            drop(global);

            if full_before && !full_after {
                self.signal_demand();
            }
            consumer.notify_detached();
        }
    }

    /// Drops the consumer with the given id from the distribution set.
    pub fn detach_consumer(&self, consumer_id: &str) {
        self.consumers.lock().retain(|c| c.id() != consumer_id);
    }

    /// Number of currently attached consumers.
    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().len()
    }

    /// Registers a demand event for a producer stream.
    ///
    /// Whenever the global buffer transitions from full to not-full all
    /// registered events are set. If the buffer is not full right now the
    /// event is pre-set so the producer starts promptly.
    pub async fn add_demand_event(&self, event: Arc<Event>) {
        self.demand_events.lock().push(Arc::clone(&event));
        if !self.buffer.is_full().await {
            event.set();
        }
    }

    /// Deregisters a previously added demand event.
    pub fn remove_demand_event(&self, event: &Arc<Event>) {
        self.demand_events.lock().retain(|e| !Arc::ptr_eq(e, event));
    }

    /// Number of currently registered demand events.
    pub fn demand_event_count(&self) -> usize {
        self.demand_events.lock().len()
    }

    fn signal_demand(&self) {
        for event in self.demand_events.lock().iter() {
            event.set();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_without_consumers_fills_the_global_buffer() {
        let resource = Resource::new("iron", 100);
        assert!(resource.add(30).await);
        assert_eq!(resource.buffer().amount().await, 30);
        assert!(!resource.add(80).await);
        assert_eq!(resource.buffer().amount().await, 100);
    }

    #[tokio::test]
    async fn add_tops_up_consumers_before_the_pool() {
        let resource = Resource::new("iron", 100);
        let consumer = Arc::new(Consumer::new("c1", "iron", 50, None, None));
        resource.attach_consumer(Arc::clone(&consumer)).await;

        assert!(resource.add(40).await);
        assert_eq!(consumer.buffer().amount().await, 40);
        assert_eq!(resource.buffer().amount().await, 0);

        assert!(resource.add(40).await);
        assert_eq!(consumer.buffer().amount().await, 50);
        assert_eq!(resource.buffer().amount().await, 30);
    }

    #[tokio::test]
    async fn attach_drains_the_global_buffer_into_the_newcomer() {
        let resource = Resource::new("iron", 100);
        resource.add(60).await;

        let consumer = Arc::new(Consumer::new("c1", "iron", 50, None, None));
        resource.attach_consumer(Arc::clone(&consumer)).await;

        assert_eq!(consumer.buffer().amount().await, 50);
        assert_eq!(resource.buffer().amount().await, 10);
    }

    #[tokio::test]
    async fn detach_removes_the_consumer_from_distribution() {
        let resource = Resource::new("iron", 100);
        let consumer = Arc::new(Consumer::new("c1", "iron", 50, None, None));
        resource.attach_consumer(Arc::clone(&consumer)).await;
        assert_eq!(resource.consumer_count(), 1);

        resource.detach_consumer("c1");
        assert_eq!(resource.consumer_count(), 0);

        resource.add(10).await;
        assert_eq!(consumer.buffer().amount().await, 0);
        assert_eq!(resource.buffer().amount().await, 10);
    }

    #[tokio::test]
    async fn demand_event_is_preset_while_the_buffer_has_headroom() {
        let resource = Resource::new("iron", 100);
        let event = Arc::new(Event::new());
        resource.add_demand_event(Arc::clone(&event)).await;
        assert!(event.is_set());
    }

    #[tokio::test]
    async fn demand_event_fires_on_the_full_to_not_full_transition() {
        let resource = Resource::new("iron", 100);
        resource.add(100).await;

        let event = Arc::new(Event::new());
        resource.add_demand_event(Arc::clone(&event)).await;
        assert!(!event.is_set(), "buffer is full, no pre-set");

        // Removing while full wakes the producers exactly once.
        assert_eq!(resource.remove(1).await, 1);
        assert!(event.is_set());

        // Still not full: further removals do not need to signal again.
        event.clear();
        assert_eq!(resource.remove(1).await, 1);
        assert!(!event.is_set());
    }

    #[tokio::test]
    async fn removed_demand_events_are_not_signalled() {
        let resource = Resource::new("iron", 10);
        resource.add(10).await;

        let event = Arc::new(Event::new());
        resource.add_demand_event(Arc::clone(&event)).await;
        resource.remove_demand_event(&event);

        resource.remove(5).await;
        assert!(!event.is_set());
    }

    #[tokio::test]
    async fn remove_all_signals_demand_when_it_opens_headroom() {
        let resource = Resource::new("iron", 10);
        resource.add(10).await;

        let event = Arc::new(Event::new());
        resource.add_demand_event(Arc::clone(&event)).await;
        assert!(!event.is_set());

        assert_eq!(resource.remove_all().await, 10);
        assert!(event.is_set());
    }
}
