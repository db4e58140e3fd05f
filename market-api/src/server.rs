//! HTTP serving with two-phase shutdown

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serve `app` until `shutdown` fires, then drain for up to `grace`
///
/// Reads built with `in_flight` keep running through the grace period; that
/// token is only cancelled when the deadline passes. Returns false when the
/// server had to be aborted with requests still open.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    in_flight: CancellationToken,
    grace: Duration,
) -> anyhow::Result<bool> {
    let mut server = tokio::spawn(
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future(),
    );

    tokio::select! {
        result = &mut server => {
            // The server only returns on its own if it failed
            result??;
            return Ok(true);
        }
        _ = shutdown.cancelled() => {}
    }

    info!("Shutting down, waiting up to {:?} for in-flight requests", grace);
    Ok(crate::shutdown::drain("HTTP server", server, grace, &in_flight).await)
}
