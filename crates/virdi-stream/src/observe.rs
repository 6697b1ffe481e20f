//! Fire-and-forget observation of production traffic.

use std::future::Future;
use std::pin::Pin;

/// Observer for successful production deliveries.
///
/// Implementations must be cheap and must not fail the production path; the
/// metrics sink is the canonical implementation. Uses native async fn in
/// traits; for dynamic dispatch use [`ProductionObserverBoxed`].
pub trait ProductionObserver: Send + Sync {
    /// Called once per accepted production frame.
    fn produced(
        &self,
        client_id: &str,
        resource_id: &str,
        amount: u64,
    ) -> impl Future<Output = ()> + Send;
}

/// Object-safe version of [`ProductionObserver`] for dynamic dispatch.
pub trait ProductionObserverBoxed: Send + Sync {
    /// Called once per accepted production frame (boxed future).
    fn produced_boxed<'a>(
        &'a self,
        client_id: &'a str,
        resource_id: &'a str,
        amount: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Blanket implementation: any [`ProductionObserver`] can be boxed.
impl<T: ProductionObserver> ProductionObserverBoxed for T {
    fn produced_boxed<'a>(
        &'a self,
        client_id: &'a str,
        resource_id: &'a str,
        amount: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.produced(client_id, resource_id, amount))
    }
}

/// Discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ProductionObserver for NullObserver {
    async fn produced(&self, _client_id: &str, _resource_id: &str, _amount: u64) {}
}
