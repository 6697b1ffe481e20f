//! The process-scoped engine: every registry in one value.
//!
//! The engine owns the resource arena (frozen at bootstrap), the consumer
//! registry, the client sessions, and the resource mappings. Handlers receive
//! an `Arc<Engine>` instead of reaching for process-global state, which keeps
//! tests isolated and lookups uniform: an id resolves to the unique live
//! entity or to nothing.

use crate::client::Client;
use crate::consumer::Consumer;
use crate::error::EngineError;
use crate::mapping::ResourceMapping;
use crate::notify::Notifier;
use crate::resource::Resource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Process-wide registries for resources, consumers, and client sessions.
#[derive(Debug, Default)]
pub struct Engine {
    resources: HashMap<String, Arc<Resource>>,
    consumers: Mutex<HashMap<String, Arc<Consumer>>>,
    clients: Mutex<HashMap<String, Arc<Client>>>,
    mappings: HashMap<(String, String), ResourceMapping>,
}

impl Engine {
    /// Creates an engine over the given resources. The resource set is fixed
    /// for the engine's lifetime.
    pub fn new(resources: impl IntoIterator<Item = Resource>) -> Self {
        let resources = resources
            .into_iter()
            .map(|resource| (resource.id().to_string(), Arc::new(resource)))
            .collect();
        Self {
            resources,
            consumers: Mutex::new(HashMap::new()),
            clients: Mutex::new(HashMap::new()),
            mappings: HashMap::new(),
        }
    }

    /// Attaches the resource mappings loaded at bootstrap.
    pub fn with_mappings(mut self, mappings: impl IntoIterator<Item = ResourceMapping>) -> Self {
        self.mappings = mappings
            .into_iter()
            .map(|m| ((m.game_id().to_string(), m.external_id().to_string()), m))
            .collect();
        self
    }

    /// Looks up a resource by id.
    pub fn resource(&self, resource_id: &str) -> Option<Arc<Resource>> {
        self.resources.get(resource_id).cloned()
    }

    /// Ids of all configured resources.
    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Looks up a consumer by id.
    pub fn consumer(&self, consumer_id: &str) -> Option<Arc<Consumer>> {
        self.consumers.lock().get(consumer_id).cloned()
    }

    /// Looks up the mapping for a game's external resource id.
    pub fn mapping(&self, game_id: &str, external_id: &str) -> Option<&ResourceMapping> {
        self.mappings
            .get(&(game_id.to_string(), external_id.to_string()))
    }

    /// Resolves a client session, creating it on first reference.
    ///
    /// Sessions are keyed by the transport-supplied client id and live for
    /// the whole process, so a reconnecting client gets its session back.
    pub fn client(&self, client_id: &str) -> Arc<Client> {
        let mut clients = self.clients.lock();
        Arc::clone(clients.entry(client_id.to_string()).or_insert_with(|| {
            info!(client = client_id, "creating client session");
            Arc::new(Client::new(client_id))
        }))
    }

    /// Creates a consumer, registers it process-wide, and attaches it to its
    /// resource (draining any waiting global buffer into it).
    ///
    /// Fails when the resource is unknown or a consumer with this id already
    /// exists anywhere in the process.
    pub async fn create_consumer(
        &self,
        consumer_id: &str,
        resource_id: &str,
        buffer_limit: u64,
        max_rate: Option<u32>,
        notifier: Option<Notifier>,
    ) -> Result<Arc<Consumer>, EngineError> {
        let resource = self
            .resource(resource_id)
            .ok_or_else(|| EngineError::UnknownResource(resource_id.to_string()))?;

        let consumer = {
            let mut consumers = self.consumers.lock();
            if consumers.contains_key(consumer_id) {
                return Err(EngineError::DuplicateConsumer(consumer_id.to_string()));
            }

            info!(
                consumer = consumer_id,
                resource = resource_id,
                buffer_limit,
                notifier = notifier.as_ref().map_or("none", Notifier::kind),
                "creating consumer"
            );

            let consumer = Arc::new(Consumer::new(
                consumer_id,
                resource_id,
                buffer_limit,
                max_rate,
                notifier,
            ));
            consumers.insert(consumer_id.to_string(), Arc::clone(&consumer));
            consumer
        };

        resource.attach_consumer(Arc::clone(&consumer)).await;

        Ok(consumer)
    }

    /// Deletes a consumer: drops it from the registry and detaches it from
    /// its resource. Returns the removed consumer, if it existed.
    pub fn remove_consumer(&self, consumer_id: &str) -> Option<Arc<Consumer>> {
        let consumer = self.consumers.lock().remove(consumer_id)?;
        if let Some(resource) = self.resource(consumer.resource_id()) {
            resource.detach_consumer(consumer_id);
        }
        info!(consumer = consumer_id, "removed consumer");
        Some(consumer)
    }

    /// Delivers produced units into a resource; the admin produce primitive.
    pub async fn produce(&self, resource_id: &str, amount: u64) -> Result<bool, EngineError> {
        let resource = self
            .resource(resource_id)
            .ok_or_else(|| EngineError::UnknownResource(resource_id.to_string()))?;
        Ok(resource.add(amount).await)
    }

    /// Manually drains a consumer; the admin consume primitive.
    ///
    /// Refused for notifier-backed consumers: their buffer is only ever
    /// drained through the notification path.
    pub async fn consume_manual(
        &self,
        consumer_id: &str,
        amount: u64,
    ) -> Result<u64, EngineError> {
        let consumer = self
            .consumer(consumer_id)
            .ok_or_else(|| EngineError::UnknownConsumer(consumer_id.to_string()))?;

        if consumer.has_notifier() {
            return Err(EngineError::ManualConsumeForbidden(consumer_id.to_string()));
        }

        let resource = self
            .resource(consumer.resource_id())
            .ok_or_else(|| EngineError::UnknownResource(consumer.resource_id().to_string()))?;

        Ok(consumer.remove(&resource, amount).await)
    }
}
