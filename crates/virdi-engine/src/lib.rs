//! ViRDi resource-routing engine
//!
//! The in-memory core of the resource-distribution broker: bounded buffers,
//! the fair distribution algorithm, demand signalling between producers and
//! consumers, and the process-scoped registries.
//!
//! Producers push units into a [`Resource`]; the distributor tops up every
//! attached [`Consumer`] before spilling into the resource's global buffer,
//! and tells the producer to stop once that buffer is full. Consumers pull
//! global-first so the shared pool always has the most headroom. All
//! cross-task signalling goes through level-triggered [`Event`]s, so both
//! sides tolerate spurious wake-ups.
//!
//! The engine is transport-neutral; stream handlers and admin surfaces live
//! in their own crates and drive it through [`Engine`].

pub mod buffer;
pub mod client;
pub mod consumer;
pub mod distribute;
pub mod engine;
pub mod error;
pub mod event;
pub mod mapping;
pub mod notify;
pub mod resource;

// Re-export main types
pub use buffer::Buffer;
pub use client::Client;
pub use consumer::Consumer;
pub use distribute::{distribute, Distribution};
pub use engine::Engine;
pub use error::EngineError;
pub use event::Event;
pub use mapping::ResourceMapping;
pub use notify::{notifier_from_tag, Notifier, Notify, NotifyBoxed, NotifyError};
pub use resource::Resource;
