//! Stream handlers for the ViRDi broker
//!
//! Transport-neutral state machines for the three streaming surfaces:
//! offering (server-streamed demand signals), producing (client-streamed
//! units), and consuming (server-streamed units). Handlers are written
//! against [`futures::Sink`] and [`futures::Stream`] of plain frame structs;
//! a transport adapter (e.g. a gRPC service) maps its messages and status
//! codes onto [`frames`] and [`HandlerError`].
//!
//! Cleanup is RAII-based: cancelling a handler future deregisters its demand
//! event or deletes its consumer, so a dropped connection never leaves state
//! behind.

pub mod consume;
pub mod error;
pub mod frames;
pub mod meta;
pub mod observe;
pub mod produce;

// Re-export main types
pub use consume::consume;
pub use error::HandlerError;
pub use frames::{
    ConsumptionRequest, ProductionFrame, ProductionOffer, ProductionReceipt, ProductionRequest,
    ResourceConsumption,
};
pub use meta::StreamMeta;
pub use observe::{NullObserver, ProductionObserver, ProductionObserverBoxed};
pub use produce::{offer_production, produce};
