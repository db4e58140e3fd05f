//! Signal handling and bounded shutdown

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Cancel `token` when the process is asked to stop
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    })
}

/// Wait up to `grace` for `task`, aborting it past the deadline
///
/// `in_flight` is the token the task's own work waits on; it is cancelled
/// only once the grace period has run out. Returns false when the task had
/// to be aborted.
pub async fn drain<T>(
    name: &str,
    mut task: JoinHandle<T>,
    grace: Duration,
    in_flight: &CancellationToken,
) -> bool
where
    T: Send + 'static,
{
    match tokio::time::timeout(grace, &mut task).await {
        Ok(_) => {
            info!("{} stopped", name);
            true
        }
        Err(_) => {
            warn!("{} did not stop within {:?}, aborting", name, grace);
            in_flight.cancel();
            task.abort();
            false
        }
    }
}
