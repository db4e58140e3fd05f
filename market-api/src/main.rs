//! Market Data Gateway API Server
//!
//! Serves cached Kalshi market data behind per-caller rate limits.

use std::net::SocketAddr;
use std::sync::Arc;

use market_api::{config, logging, routes, server, shutdown, state, AppConfig, Components};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    let config = AppConfig::from_env()?;
    logging::init(config.log_format);

    info!("Starting market data gateway API");

    // Stops accepting connections on a signal; reads only see the second
    // token, which fires once the grace period is exhausted
    let shutdown_token = CancellationToken::new();
    let in_flight_token = CancellationToken::new();

    let store = state::connect_store(&config).await?;
    let source = Arc::new(state::kalshi_client(&config)?);
    let components = Components::build(&config, store, source, in_flight_token.clone());

    let app = routes::router(components.state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    shutdown::cancel_on_signal(shutdown_token.clone());

    let drained = server::serve(
        listener,
        app,
        shutdown_token,
        in_flight_token,
        config.shutdown_grace,
    )
    .await?;
    if !drained {
        error!("Forced shutdown with requests still in flight");
    }

    Ok(())
}
