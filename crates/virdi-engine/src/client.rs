//! Client sessions: per-connected-client consumer bookkeeping.

use crate::consumer::Consumer;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::event::Event;
use crate::notify::Notifier;
use crate::resource::Resource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// One game server/instance talking to the broker.
///
/// The session is keyed by the transport's `client-id` metadata and outlives
/// individual connections; it brokers production on behalf of the client and
/// tracks the consumers the client registered.
#[derive(Debug)]
pub struct Client {
    id: String,
    consumers: Mutex<HashMap<String, Arc<Consumer>>>,
}

impl Client {
    /// Creates a session. Use [`Engine::client`] so sessions are shared
    /// across reconnects.
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            consumers: Mutex::new(HashMap::new()),
        }
    }

    /// The identifier the client supplied in its transport metadata.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handles production of the given resource on behalf of this client.
    ///
    /// Returns `true` as long as the broker still needs the resource.
    pub async fn handle_resource_production(&self, resource: &Resource, amount: u64) -> bool {
        resource.add(amount).await
    }

    /// Registers a consumer for this session, bound to an event-signal
    /// notifier so the consumer's stream handler is woken when units arrive.
    ///
    /// Fails with [`EngineError::DuplicateConsumer`] if the id is taken
    /// anywhere in the process.
    pub async fn add_consumer(
        &self,
        engine: &Engine,
        consumer_id: &str,
        resource: &Resource,
        buffer_limit: u64,
        max_rate: u32,
        event: Arc<Event>,
    ) -> Result<Arc<Consumer>, EngineError> {
        let consumer = engine
            .create_consumer(
                consumer_id,
                resource.id(),
                buffer_limit,
                Some(max_rate),
                Some(Notifier::event(event)),
            )
            .await?;

        self.consumers
            .lock()
            .insert(consumer_id.to_string(), Arc::clone(&consumer));

        Ok(consumer)
    }

    /// Deletes a consumer: removed from the process registry, detached from
    /// its resource, and dropped from this session.
    pub fn remove_consumer(&self, engine: &Engine, consumer_id: &str) -> Option<Arc<Consumer>> {
        self.consumers.lock().remove(consumer_id);
        let removed = engine.remove_consumer(consumer_id);
        if removed.is_some() {
            info!(client = %self.id, consumer = consumer_id, "removed session consumer");
        }
        removed
    }

    /// Number of consumers currently registered by this session.
    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().len()
    }
}
