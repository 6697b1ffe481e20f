//! Producer-side stream handlers.
//!
//! Two handlers cover the producer lifecycle. [`offer_production`] keeps a
//! demand event registered on the resource and relays every demand signal to
//! the peer; [`produce`] drains the peer's unit stream into the resource and
//! cuts the stream off once the broker has no more room.

use crate::error::HandlerError;
use crate::frames::{ProductionFrame, ProductionOffer, ProductionReceipt, ProductionRequest};
use crate::meta::StreamMeta;
use crate::observe::ProductionObserver;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};
use virdi_engine::{Engine, Event, Resource};

/// Removes the demand event when the handler unwinds, including on
/// cancellation, so a gone producer never keeps a wake-up slot.
struct DemandEventGuard {
    resource: Arc<Resource>,
    event: Arc<Event>,
}

impl Drop for DemandEventGuard {
    fn drop(&mut self) {
        self.resource.remove_demand_event(&self.event);
        debug!(resource = %self.resource.id(), "demand event deregistered");
    }
}

/// Relays demand for a resource to an offering producer.
///
/// Registers a demand event on the resource and then loops: wait for the
/// event, emit a [`ProductionRequest`] to the peer, clear the event. The
/// event is pre-set while the buffer has headroom, so a fresh producer is
/// asked to send immediately.
///
/// Ends with `Ok(())` when the peer stops reading; precondition failures
/// terminate the stream before the loop starts.
pub async fn offer_production<S>(
    engine: &Arc<Engine>,
    meta: &StreamMeta,
    offer: ProductionOffer,
    mut requests: S,
) -> Result<(), HandlerError>
where
    S: Sink<ProductionRequest> + Unpin,
{
    let client_id = meta.require_client_id()?;
    let client = engine.client(client_id);
    let resource = engine
        .resource(&offer.resource_id)
        .ok_or_else(|| HandlerError::UnknownResource(offer.resource_id.clone()))?;

    info!(client = %client.id(), resource = %resource.id(), "client started offering");

    let event = Arc::new(Event::new());
    resource.add_demand_event(Arc::clone(&event)).await;
    let _guard = DemandEventGuard {
        resource: Arc::clone(&resource),
        event: Arc::clone(&event),
    };

    loop {
        event.wait().await;

        if requests.send(ProductionRequest).await.is_err() {
            info!(client = %client.id(), resource = %resource.id(), "client stopped offering");
            return Ok(());
        }

        event.clear();
    }
}

/// Drains a producer's unit stream into the resource it announced.
///
/// The first inbound frame must be [`ProductionFrame::Init`]; every following
/// frame carries an amount that is handed to the resource. When the resource
/// reports that its buffer finished a delivery full, the stream terminates
/// with [`HandlerError::ResourceExhausted`] so the peer backs off. A stream
/// that simply ends yields a [`ProductionReceipt`].
pub async fn produce<St, O>(
    engine: &Arc<Engine>,
    meta: &StreamMeta,
    mut inbound: St,
    observer: &O,
) -> Result<ProductionReceipt, HandlerError>
where
    St: Stream<Item = ProductionFrame> + Unpin,
    O: ProductionObserver,
{
    let client_id = meta.require_client_id()?;
    let client = engine.client(client_id);

    let Some(ProductionFrame::Init { resource_id }) = inbound.next().await else {
        return Err(HandlerError::MissingInit);
    };
    let resource = engine
        .resource(&resource_id)
        .ok_or_else(|| HandlerError::UnknownResource(resource_id.clone()))?;

    info!(client = %client.id(), resource = %resource.id(), "client started sending");

    while let Some(frame) = inbound.next().await {
        let amount = match frame {
            ProductionFrame::Amount(amount) => amount,
            ProductionFrame::Init { .. } => {
                debug!(client = %client.id(), "ignoring repeated init frame");
                continue;
            }
        };

        let keep_coming = client.handle_resource_production(&resource, amount).await;

        observer
            .produced(client.id(), resource.id(), amount)
            .await;

        if !keep_coming {
            info!(client = %client.id(), resource = %resource.id(), "stopping client, buffer full");
            return Err(HandlerError::ResourceExhausted(resource_id));
        }
    }

    info!(client = %client.id(), resource = %resource.id(), "client stopped sending");
    Ok(ProductionReceipt)
}
