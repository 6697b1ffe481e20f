//! Level-triggered signalling between the engine and stream handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A level-triggered signal.
///
/// `set` wakes every current waiter and leaves the event set until `clear` is
/// called; waiters that arrive while the event is set return immediately.
/// Used for producer demand events and consumer availability wake-ups.
///
/// Sets may be spurious (for example the pre-set on demand-event
/// registration), so woken tasks re-check the condition they are actually
/// waiting for.
#[derive(Debug, Default)]
pub struct Event {
    set: AtomicBool,
    notify: Notify,
}

impl Event {
    /// Creates a new, unset event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event and wakes all waiters.
    pub fn set(&self) {
        self.set.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Clears the event; later `wait` calls block until the next `set`.
    pub fn clear(&self) {
        self.set.store(false, Ordering::Release);
    }

    /// Returns `true` while the event is set.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// Waits until the event is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        while !self.is_set() {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register as a waiter before the final flag check so a
            // concurrent `set` between check and await cannot be lost.
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_immediately_when_set() {
        let event = Event::new();
        event.set();
        tokio::time::timeout(Duration::from_millis(100), event.wait())
            .await
            .expect("wait should not block on a set event");
    }

    #[tokio::test]
    async fn set_wakes_a_blocked_waiter() {
        let event = Arc::new(Event::new());
        let waiter = {
            let event = Arc::clone(&event);
            tokio::spawn(async move { event.wait().await })
        };
        tokio::task::yield_now().await;
        event.set();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
    }

    #[tokio::test]
    async fn clear_makes_wait_block_again() {
        let event = Event::new();
        event.set();
        event.wait().await;
        event.clear();
        assert!(!event.is_set());
        let blocked = tokio::time::timeout(Duration::from_millis(50), event.wait()).await;
        assert!(blocked.is_err(), "wait should block after clear");
    }

    #[tokio::test]
    async fn set_stays_set_across_multiple_waits() {
        let event = Event::new();
        event.set();
        event.wait().await;
        event.wait().await;
        assert!(event.is_set());
    }
}
