//! Cache warming worker
//!
//! Keeps hot markets, category overviews and the category list warm in the
//! shared cache so that API instances mostly serve hits.

use std::sync::Arc;

use market_api::{config, logging, shutdown, state, AppConfig, Components};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    let config = AppConfig::from_env()?;
    logging::init(config.log_format);

    info!("Starting cache warming worker");
    if config.redis_url.is_none() {
        warn!("Without REDIS_URL the worker warms a private cache no API instance can read");
    }

    let shutdown_token = CancellationToken::new();
    let store = state::connect_store(&config).await?;
    let source = Arc::new(state::kalshi_client(&config)?);
    let components = Components::build(&config, store, source, shutdown_token.clone());

    let warmer = Arc::new(components.warmer(&config));
    let handle = warmer.start(shutdown_token.clone());

    shutdown::cancel_on_signal(shutdown_token.clone());
    shutdown_token.cancelled().await;

    info!(
        "Stopping cache warmer, waiting up to {:?} for in-flight passes",
        config.shutdown_grace
    );
    if !handle.shutdown(config.shutdown_grace).await {
        warn!("Cache warmer was aborted before finishing its passes");
    }

    Ok(())
}
