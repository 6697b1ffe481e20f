//! ViRDi broker process pieces
//!
//! The application layer around the engine: YAML config bootstrap, the admin
//! HTTP surface, the batched metrics sink, and signal-driven shutdown. The
//! `virdi` binary wires these together; the modules are exported so tests
//! and embedders can drive them directly.

pub mod admin;
pub mod config;
pub mod metrics;
pub mod shutdown;

// Re-export main types
pub use admin::router;
pub use config::{build_engine, load_dir, BootstrapConfig, ConfigError};
pub use metrics::{MetricPoint, MetricsConfig, MetricsHandle};
