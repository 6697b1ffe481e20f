//! Bounded unit reservoir shared by resources and consumers.
//!
//! A [`Buffer`] is a pair `(amount, limit)` with `0 <= amount <= limit` after
//! every operation. The self-locking operations serialise through an internal
//! async mutex; the `*_locked` twins operate on an already-held guard so that
//! callers such as the distributor can keep several buffers locked across one
//! critical section without re-entering the mutex.

use tokio::sync::{Mutex, MutexGuard};

/// A buffer which can hold a bounded amount of resource units.
///
/// Used for the per-resource global buffer and for consumer-local buffers.
#[derive(Debug)]
pub struct Buffer {
    limit: u64,
    amount: Mutex<u64>,
}

impl Buffer {
    /// Creates an empty buffer with the given limit.
    pub fn new(limit: u64) -> Self {
        Self::with_amount(limit, 0)
    }

    /// Creates a buffer with an initial amount, clamped to the limit.
    pub fn with_amount(limit: u64, initial_amount: u64) -> Self {
        Self {
            limit,
            amount: Mutex::new(initial_amount.min(limit)),
        }
    }

    /// The maximum amount that can be stored.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The amount currently stored.
    pub async fn amount(&self) -> u64 {
        *self.amount.lock().await
    }

    /// Acquires the buffer's mutex for a caller-synchronised sequence of
    /// `*_locked` operations.
    pub async fn lock(&self) -> MutexGuard<'_, u64> {
        self.amount.lock().await
    }

    /// Adds up to `amount` units and returns how many were actually added.
    ///
    /// Once the buffer is full nothing more is accepted; the return value is
    /// then less than `amount`.
    pub async fn add(&self, amount: u64) -> u64 {
        let mut slot = self.amount.lock().await;
        self.add_locked(&mut slot, amount)
    }

    /// `add` against a guard the caller already holds.
    pub fn add_locked(&self, slot: &mut u64, amount: u64) -> u64 {
        let added = amount.min(self.limit - *slot);
        *slot += added;
        added
    }

    /// Removes up to `amount` units and returns how many were actually
    /// removed. An empty buffer removes nothing.
    pub async fn remove(&self, amount: u64) -> u64 {
        let mut slot = self.amount.lock().await;
        self.remove_locked(&mut slot, amount)
    }

    /// `remove` against a guard the caller already holds.
    pub fn remove_locked(&self, slot: &mut u64, amount: u64) -> u64 {
        let removed = amount.min(*slot);
        *slot -= removed;
        removed
    }

    /// Empties the buffer and returns the amount that was stored.
    pub async fn remove_all(&self) -> u64 {
        let mut slot = self.amount.lock().await;
        self.remove_all_locked(&mut slot)
    }

    /// `remove_all` against a guard the caller already holds.
    pub fn remove_all_locked(&self, slot: &mut u64) -> u64 {
        std::mem::take(slot)
    }

    /// Returns `true` once the stored amount has reached the limit.
    pub async fn is_full(&self) -> bool {
        let slot = self.amount.lock().await;
        self.is_full_locked(&slot)
    }

    /// `is_full` against a guard the caller already holds.
    pub fn is_full_locked(&self, slot: &u64) -> bool {
        *slot >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_clamps_at_limit() {
        let buffer = Buffer::new(100);
        assert_eq!(buffer.add(30).await, 30);
        assert_eq!(buffer.amount().await, 30);
        assert_eq!(buffer.add(80).await, 70);
        assert_eq!(buffer.amount().await, 100);
        assert!(buffer.is_full().await);
        assert_eq!(buffer.add(1).await, 0);
        assert_eq!(buffer.amount().await, 100);
    }

    #[tokio::test]
    async fn remove_clamps_at_zero() {
        let buffer = Buffer::with_amount(50, 20);
        assert_eq!(buffer.remove(5).await, 5);
        assert_eq!(buffer.remove(100).await, 15);
        assert_eq!(buffer.remove(1).await, 0);
        assert_eq!(buffer.amount().await, 0);
    }

    #[tokio::test]
    async fn remove_all_empties() {
        let buffer = Buffer::with_amount(50, 37);
        assert_eq!(buffer.remove_all().await, 37);
        assert_eq!(buffer.amount().await, 0);
        assert_eq!(buffer.remove_all().await, 0);
    }

    #[tokio::test]
    async fn initial_amount_is_clamped() {
        let buffer = Buffer::with_amount(10, 25);
        assert_eq!(buffer.amount().await, 10);
        assert!(buffer.is_full().await);
    }

    #[tokio::test]
    async fn locked_ops_share_one_critical_section() {
        let buffer = Buffer::new(10);
        let mut slot = buffer.lock().await;
        assert_eq!(buffer.add_locked(&mut slot, 7), 7);
        assert!(!buffer.is_full_locked(&slot));
        assert_eq!(buffer.add_locked(&mut slot, 7), 3);
        assert!(buffer.is_full_locked(&slot));
        assert_eq!(buffer.remove_locked(&mut slot, 4), 4);
        assert_eq!(buffer.remove_all_locked(&mut slot), 6);
        drop(slot);
        assert_eq!(buffer.amount().await, 0);
    }
}
