//! Process signal handling for graceful shutdown.

use tracing::{info, warn};

/// Completes once SIGINT or SIGTERM arrives.
///
/// Used as the graceful-shutdown trigger for the admin listener: the server
/// stops accepting new connections, in-flight handlers unwind (their guards
/// deregister demand events and session consumers), and the metrics batch is
/// flushed before exit.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for ctrl-c, graceful shutdown not possible");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to listen for SIGTERM, graceful shutdown not possible");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutting down");
}
