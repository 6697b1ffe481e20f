//! Consumer-side stream handler.
//!
//! The broker models the *client's* buffer from the server side using only
//! the declared maximum rate and aims to keep the model between 25% and 75%
//! fill. Delivery is therefore bursty but smooth: one frame tops the model up
//! to 75%, then the handler sleeps until the model decays back to 25%. When
//! the broker itself has nothing to deliver, the handler parks on the
//! consumer's availability event until distribution wakes it.

use crate::error::HandlerError;
use crate::frames::{ConsumptionRequest, ResourceConsumption};
use crate::meta::StreamMeta;
use futures::{Sink, SinkExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use virdi_engine::{Client, Engine, Event};

/// Deletes the consumer when the handler unwinds, including on cancellation:
/// the consumer leaves the registry, its resource, and the session.
struct ConsumerGuard<'a> {
    engine: &'a Engine,
    client: Arc<Client>,
    consumer_id: String,
}

impl Drop for ConsumerGuard<'_> {
    fn drop(&mut self) {
        self.client.remove_consumer(self.engine, &self.consumer_id);
    }
}

/// Ages the modelled client buffer by the wall-clock time since `last_tick`.
fn decay(assumed_amount: &mut f64, last_tick: &mut Instant, rate_per_minute: f64) {
    let now = Instant::now();
    let elapsed = now.duration_since(*last_tick).as_secs_f64();
    *assumed_amount = (*assumed_amount - elapsed * rate_per_minute / 60.0).max(0.0);
    *last_tick = now;
}

/// Streams a resource to a consuming client at its declared rate.
///
/// Registers a consumer bound to an event-signal notifier (the request's
/// `buffer_limit` falls back to `max_rate` when omitted), then loops over
/// the 25%–75% model:
///
/// 1. decay the modelled client buffer by elapsed wall-clock time,
/// 2. sleep until the model reaches the 25% line,
/// 3. pull up to the 75% target from the global and local buffers,
/// 4. emit what was pulled, or park on the availability event when the
///    broker had nothing.
///
/// Ends with `Ok(())` when the peer stops reading. The consumer is deleted
/// on any exit.
pub async fn consume<S>(
    engine: &Arc<Engine>,
    meta: &StreamMeta,
    request: ConsumptionRequest,
    mut out: S,
) -> Result<(), HandlerError>
where
    S: Sink<ResourceConsumption> + Unpin,
{
    let client_id = meta.require_client_id()?;
    let client = engine.client(client_id);
    let resource = engine
        .resource(&request.resource_id)
        .ok_or_else(|| HandlerError::UnknownResource(request.resource_id.clone()))?;

    if request.max_rate == 0 {
        return Err(HandlerError::InvalidRequest(
            "max_rate must be positive".to_string(),
        ));
    }

    let buffer_limit = request
        .buffer_limit
        .unwrap_or_else(|| u64::from(request.max_rate));

    let availability = Arc::new(Event::new());
    let consumer = client
        .add_consumer(
            engine,
            &request.consumer_id,
            &resource,
            buffer_limit,
            request.max_rate,
            Arc::clone(&availability),
        )
        .await?;
    let _guard = ConsumerGuard {
        engine,
        client: Arc::clone(&client),
        consumer_id: request.consumer_id.clone(),
    };

    info!(
        client = %client.id(),
        consumer = %consumer.id(),
        resource = %resource.id(),
        "starting consumption stream"
    );

    // Maybe something is already buffered for us.
    availability.set();

    let limit = buffer_limit as f64;
    let rate = f64::from(request.max_rate);
    let mut assumed_amount = request.current_buffer_amount.unwrap_or(0) as f64;
    let mut last_tick = Instant::now();

    loop {
        decay(&mut assumed_amount, &mut last_tick, rate);

        // Wait until the modelled client buffer falls to the 25% line.
        let sleep_secs = ((assumed_amount - 0.25 * limit) * 60.0 / rate).max(0.0);
        tokio::time::sleep(Duration::from_secs_f64(sleep_secs)).await;

        decay(&mut assumed_amount, &mut last_tick, rate);

        // Top the model back up to 75%.
        let target = ((0.75 * limit) - assumed_amount).round().max(0.0) as u64;
        let pulled = consumer.remove(&resource, target).await;

        if pulled > 0 {
            assumed_amount += pulled as f64;
            if out.send(ResourceConsumption { amount: pulled }).await.is_err() {
                debug!(consumer = %consumer.id(), "peer stopped reading");
                return Ok(());
            }
        } else {
            availability.wait().await;
            availability.clear();
        }
    }
}
