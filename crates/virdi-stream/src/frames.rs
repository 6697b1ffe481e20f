//! Frame types exchanged with peers.
//!
//! These are the transport-neutral shapes of the wire messages; a transport
//! adapter maps them onto its own framing (e.g. protobuf messages) without
//! the handlers knowing.

/// A client offers to produce a resource whenever the broker asks for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionOffer {
    /// The resource the client can produce.
    pub resource_id: String,
}

/// Demand signal sent to an offering producer: send units now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionRequest;

/// One frame of an inbound production stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionFrame {
    /// The mandatory first frame naming the produced resource.
    Init {
        /// The resource the stream delivers.
        resource_id: String,
    },
    /// A delivery of units.
    Amount(u64),
}

/// Acknowledgement returned when a production stream ends on the client's
/// own accord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionReceipt;

/// A client requests a resource to be streamed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRequest {
    /// Process-wide unique id for the consumer to register.
    pub consumer_id: String,
    /// The resource to consume.
    pub resource_id: String,
    /// Maximum consumption rate in units per minute.
    pub max_rate: u32,
    /// The client's buffer size; falls back to `max_rate` when omitted.
    pub buffer_limit: Option<u64>,
    /// What the client's buffer holds right now, if it knows.
    pub current_buffer_amount: Option<u64>,
}

/// A delivery of units to a consuming client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceConsumption {
    /// The amount delivered with this frame.
    pub amount: u64,
}
