//! The ViRDi broker process.
//!
//! Boots the engine from the config directory, starts the metrics writer and
//! the admin HTTP listener, and runs until SIGINT/SIGTERM.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use virdi_server::{admin, config, metrics, shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_dir = std::env::var("VIRDI_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let bootstrap = config::load_dir(Path::new(&config_dir))
        .with_context(|| format!("loading config from {config_dir}"))?;
    let engine = Arc::new(config::build_engine(&bootstrap)?);
    info!(
        resources = engine.resource_ids().count(),
        "engine bootstrapped"
    );

    let (metrics_handle, metrics_task) = metrics::spawn(metrics::MetricsConfig::from_env());

    let addr = std::env::var("VIRDI_ADMIN_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding admin listener on {addr}"))?;
    info!(%addr, "admin surface listening");

    axum::serve(listener, admin::router(Arc::clone(&engine)))
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .context("admin server failed")?;

    // Dropping the last handle closes the queue; the writer drains and
    // flushes its final batch before exiting.
    drop(metrics_handle);
    metrics_task.await.context("metrics writer panicked")?;

    Ok(())
}
